use crate::error::LinkError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LinkConfig {
    pub serial: SerialConfig,
    pub link: ProtocolConfig,
    pub timing: TimingConfig,
    pub signals: SignalFilesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Number of wire addresses swept per phase, at most 128.
    pub data_width: usize,
    /// First wire address of the probe window; decoded bits at and above
    /// it mirror into the Probe signal group.
    pub probe_offset: u8,
    /// Report a stale-request condition after this many unanswered sends
    /// of one request. Unset repeats forever.
    pub stale_after: Option<u32>,
    /// Pattern rows as 0/1 integers, one row per write sweep. Unset uses
    /// the built-in reference rows.
    pub pattern_rows: Option<Vec<Vec<u8>>>,
    /// Stop after this many driver ticks. Unset runs until shutdown.
    pub runtime_ticks: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimingConfig {
    /// Pause at the end of each tick.
    pub tick_interval_ms: u64,
    /// Turnaround wait between emitting a request and draining the port.
    pub rx_delay_ms: u64,
    /// Cadence of the receive-buffer status line.
    pub report_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SignalFilesConfig {
    pub probe_file: Option<PathBuf>,
    pub switch_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            link: ProtocolConfig::default(),
            timing: TimingConfig::default(),
            signals: SignalFilesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB4".to_string(),
            baud: 19200,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            data_width: 66,
            probe_offset: 36,
            stale_after: None,
            pattern_rows: None,
            runtime_ticks: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1,
            rx_delay_ms: 1,
            report_interval_ms: 10,
        }
    }
}

impl Default for SignalFilesConfig {
    fn default() -> Self {
        Self {
            probe_file: None,
            switch_file: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<LinkConfig, LinkError> {
    let mut builder = Config::builder().add_source(Config::try_from(&LinkConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(LinkError::Config(config::ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            ))));
        }
    } else {
        // Try common config file locations
        let possible_paths = ["gbt-link.toml", "config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
                break;
            }
        }
    }

    // Add environment variable overrides with prefix "GBT_LINK_"
    builder = builder.add_source(
        Environment::with_prefix("GBT_LINK")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    Ok(config.try_deserialize::<LinkConfig>()?)
}

/// Load configuration with better error handling and defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> LinkConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            LinkConfig::default()
        }
    }
}
