use clap::Parser;
use env_logger::Env;
use gbt_link::{
    LinkConfig, LinkDriver, LinkError, SerialTransport, SignalGroup, SignalTable,
    load_config_or_default, read_signal_file,
};
use log::{error, info};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// GBT Link Mirror
#[derive(Parser, Debug)]
#[command(name = "gbt-mirror")]
#[command(about = "Mirrors switch bits into an FPGA over a serial GBT link and reads probes back", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial port override (e.g. /dev/ttyUSB4)
    #[arg(short, long, value_name = "PORT")]
    port: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();
    let mut config = load_config_or_default(args.config.as_deref());
    if let Some(port) = args.port {
        config.serial.port = port;
    }

    let log_level = args
        .log_level
        .unwrap_or_else(|| config.logging.log_level.clone());
    env_logger::Builder::from_env(Env::default().default_filter_or(&log_level)).init();

    if let Err(e) = run(config) {
        error!("{e}");
        process::exit(1);
    }
}

fn run(config: LinkConfig) -> Result<(), LinkError> {
    info!(
        "opening {} at {} baud (8N1)",
        config.serial.port, config.serial.baud
    );
    let transport = SerialTransport::open(&config.serial.port, config.serial.baud)?;

    let signals = load_signals(&config)?;
    let mut driver = LinkDriver::new(&config, Box::new(transport), signals)?;

    let shutdown = setup_shutdown_handler()?;
    driver.run(shutdown)
}

/// Populate the signal table from the configured name files, if any.
fn load_signals(config: &LinkConfig) -> Result<SignalTable, LinkError> {
    let mut table = SignalTable::new();
    if let Some(path) = &config.signals.probe_file {
        table.load(SignalGroup::Probe, read_signal_file(path)?)?;
        info!(
            "loaded {} probe signals from {}",
            table.len(SignalGroup::Probe),
            path.display()
        );
    }
    if let Some(path) = &config.signals.switch_file {
        table.load(SignalGroup::Switch, read_signal_file(path)?)?;
        info!(
            "loaded {} switch signals from {}",
            table.len(SignalGroup::Switch),
            path.display()
        );
    }
    Ok(table)
}

/// Ctrl-C flips a flag the driver checks between requests; a failure to
/// register the handler aborts startup since the loop could otherwise
/// only be stopped by killing the process mid-request.
fn setup_shutdown_handler() -> Result<Arc<AtomicBool>, LinkError> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl-C received, finishing current request");
        handler_flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| LinkError::ShutdownHook(e.to_string()))?;
    Ok(flag)
}
