//! Driver loop tying the transmit scheduler and receive processor to a
//! transport on a fixed cadence. Owns every piece of engine state and the
//! cooperative shutdown check.

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::pattern::WritePatternTable;
use crate::receiver::{LinkStats, ReceiveBuffer, ReceiveProcessor};
use crate::scheduler::TransmitScheduler;
use crate::signals::{SignalGroup, SignalTable};
use crate::transport::{POLL_CHUNK, Transport};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub struct LinkDriver {
    transport: Box<dyn Transport>,
    scheduler: TransmitScheduler,
    receiver: ReceiveProcessor,
    patterns: WritePatternTable,
    signals: SignalTable,
    buffer: ReceiveBuffer,
    stats: LinkStats,
    tick_interval: Duration,
    rx_delay: Duration,
    report_interval: Duration,
    runtime_ticks: Option<u64>,
}

impl LinkDriver {
    pub fn new(
        config: &LinkConfig,
        transport: Box<dyn Transport>,
        signals: SignalTable,
    ) -> Result<Self, LinkError> {
        let width = config.link.data_width;
        if width == 0 || width > 128 {
            return Err(LinkError::DataWidth(width));
        }
        if config.link.probe_offset as usize >= width {
            warn!(
                "probe offset {} leaves no probe window in a {}-address space",
                config.link.probe_offset, width
            );
        }

        let rows = match &config.link.pattern_rows {
            Some(rows) => rows
                .iter()
                .map(|row| row.iter().map(|&bit| bit != 0).collect())
                .collect(),
            None => WritePatternTable::default_rows(width),
        };
        let patterns = WritePatternTable::new(rows, width)?;

        Ok(Self {
            transport,
            scheduler: TransmitScheduler::new(width as u8),
            receiver: ReceiveProcessor::new(config.link.probe_offset, config.link.stale_after),
            patterns,
            signals,
            buffer: ReceiveBuffer::new(width),
            stats: LinkStats::default(),
            tick_interval: Duration::from_millis(config.timing.tick_interval_ms),
            rx_delay: Duration::from_millis(config.timing.rx_delay_ms),
            report_interval: Duration::from_millis(config.timing.report_interval_ms),
            runtime_ticks: config.link.runtime_ticks,
        })
    }

    /// Run until the shutdown flag is set or the configured tick limit is
    /// reached. The flag is checked once per iteration, between requests,
    /// never mid-request.
    pub fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<(), LinkError> {
        info!(
            "link driver started: {} addresses, {} pattern rows",
            self.buffer.width(),
            self.patterns.row_count()
        );

        let mut last_report = Instant::now();
        let mut ticks: u64 = 0;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested");
                break;
            }
            if let Some(limit) = self.runtime_ticks {
                if ticks >= limit {
                    info!("runtime limit of {limit} ticks reached");
                    break;
                }
            }

            self.step()?;
            ticks += 1;

            if last_report.elapsed() >= self.report_interval {
                self.report();
                last_report = Instant::now();
            }
            thread::sleep(self.tick_interval);
        }

        self.report();
        self.log_stats();
        Ok(())
    }

    /// One tick: emit, wait out the line turnaround, drain the port.
    fn step(&mut self) -> Result<(), LinkError> {
        if self
            .scheduler
            .tick(self.transport.as_mut(), &mut self.patterns)?
            .is_some()
        {
            self.stats.requests_sent += 1;
        }
        thread::sleep(self.rx_delay);
        let bytes = self.transport.poll(POLL_CHUNK)?;
        self.receiver.process(
            &bytes,
            &mut self.scheduler,
            &mut self.buffer,
            &mut self.signals,
            &mut self.stats,
        );
        Ok(())
    }

    /// One status line per report period, rendering the receive buffer.
    fn report(&self) {
        let line: String = self
            .buffer
            .as_slice()
            .iter()
            .map(|&bit| if bit == 0 { '0' } else { '1' })
            .collect();
        info!("rx {line}");
        if !self.signals.is_empty(SignalGroup::Probe) {
            debug!("probes {}", self.signals.render(SignalGroup::Probe));
        }
    }

    fn log_stats(&self) {
        info!(
            "link stats: {} requests, {} replies, {} repeats, {} stale, {} out-of-range, {} discarded bytes",
            self.stats.requests_sent,
            self.stats.replies,
            self.stats.repeats,
            self.stats.stale_requests,
            self.stats.dropped_out_of_range,
            self.stats.discarded_bytes
        );
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn receive_buffer(&self) -> &ReceiveBuffer {
        &self.buffer
    }

    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    pub fn patterns(&self) -> &WritePatternTable {
        &self.patterns
    }
}
