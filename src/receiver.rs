//! Receive side of the link.
//!
//! Decodes whatever bytes the transport buffered since the last tick into
//! the receive buffer and drives the transmitter status: bytes resolve the
//! outstanding request to `Idle`, silence marks it for `Repeat`.

use crate::protocol::{self, Reply};
use crate::scheduler::{TransmitScheduler, TxStatus};
use crate::signals::{SignalGroup, SignalTable};
use log::{debug, warn};

/// Last-known decoded bit per wire address, updated in place.
#[derive(Debug)]
pub struct ReceiveBuffer {
    bits: Vec<u8>,
}

impl ReceiveBuffer {
    pub fn new(width: usize) -> Self {
        Self {
            bits: vec![0; width],
        }
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn get(&self, address: u8) -> Option<u8> {
        self.bits.get(address as usize).copied()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bits
    }

    fn set(&mut self, address: u8, bit: u8) {
        self.bits[address as usize] = bit;
    }
}

/// Counters kept for the life of the link, reported at teardown.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkStats {
    pub requests_sent: u64,
    pub replies: u64,
    pub repeats: u64,
    pub stale_requests: u64,
    pub dropped_out_of_range: u64,
    pub discarded_bytes: u64,
}

pub struct ReceiveProcessor {
    probe_offset: u8,
    stale_after: Option<u32>,
    consecutive_misses: u32,
}

impl ReceiveProcessor {
    /// Addresses at `probe_offset` and above mirror into the Probe group
    /// of the signal table. `stale_after` bounds how many unanswered
    /// resends of one request pass before a stale-request condition is
    /// reported; `None` repeats forever, silently.
    pub fn new(probe_offset: u8, stale_after: Option<u32>) -> Self {
        Self {
            probe_offset,
            stale_after,
            consecutive_misses: 0,
        }
    }

    /// Feed the bytes polled since the last tick. Zero bytes while a reply
    /// is due marks the outstanding request for repeat; anything else
    /// resolves it.
    pub fn process(
        &mut self,
        bytes: &[u8],
        scheduler: &mut TransmitScheduler,
        buffer: &mut ReceiveBuffer,
        signals: &mut SignalTable,
        stats: &mut LinkStats,
    ) {
        if scheduler.status() != TxStatus::AwaitingReply {
            if !bytes.is_empty() {
                // Nothing outstanding these could answer.
                stats.discarded_bytes += bytes.len() as u64;
                debug!("discarding {} unsolicited bytes", bytes.len());
            }
            return;
        }

        if bytes.is_empty() {
            self.miss(scheduler, stats);
            return;
        }

        scheduler.set_status(TxStatus::Idle);
        self.consecutive_misses = 0;
        for &byte in bytes {
            let Reply { address, bit } = protocol::decode_reply(byte);
            if (address as usize) < buffer.width() {
                buffer.set(address, bit);
                stats.replies += 1;
                self.mirror_probe(address, bit, signals);
            } else {
                stats.dropped_out_of_range += 1;
                debug!("dropping reply for out-of-range address {address:#04x}");
            }
        }
    }

    fn miss(&mut self, scheduler: &mut TransmitScheduler, stats: &mut LinkStats) {
        scheduler.set_status(TxStatus::Repeat);
        stats.repeats += 1;
        let Some(limit) = self.stale_after else {
            return;
        };
        self.consecutive_misses += 1;
        if self.consecutive_misses >= limit {
            stats.stale_requests += 1;
            warn!(
                "request {:?} stale after {} unanswered sends",
                scheduler.last_request(),
                self.consecutive_misses
            );
            self.consecutive_misses = 0;
        }
    }

    fn mirror_probe(&self, address: u8, bit: u8, signals: &mut SignalTable) {
        if address < self.probe_offset {
            return;
        }
        let index = address - self.probe_offset;
        // Addresses past the probe window still land in the receive
        // buffer, they just have no named probe attached.
        let _ = signals.set(SignalGroup::Probe, index, bit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::WritePatternTable;
    use crate::protocol::encode_reply;
    use crate::transport::testing::ScriptedTransport;

    const WIDTH: usize = 4;

    struct Fixture {
        scheduler: TransmitScheduler,
        buffer: ReceiveBuffer,
        signals: SignalTable,
        stats: LinkStats,
        patterns: WritePatternTable,
        transport: ScriptedTransport,
    }

    fn fixture(width: usize) -> Fixture {
        Fixture {
            scheduler: TransmitScheduler::new(width as u8),
            buffer: ReceiveBuffer::new(width),
            signals: SignalTable::new(),
            stats: LinkStats::default(),
            patterns: WritePatternTable::new(
                WritePatternTable::default_rows(width),
                width,
            )
            .unwrap(),
            transport: ScriptedTransport::new(),
        }
    }

    fn await_reply(f: &mut Fixture) {
        f.scheduler.tick(&mut f.transport, &mut f.patterns).unwrap();
        assert_eq!(f.scheduler.status(), TxStatus::AwaitingReply);
    }

    #[test]
    fn replies_land_at_their_addresses() {
        let mut f = fixture(WIDTH);
        let mut processor = ReceiveProcessor::new(WIDTH as u8, None);

        await_reply(&mut f);
        processor.process(
            &[0x81, 0x02],
            &mut f.scheduler,
            &mut f.buffer,
            &mut f.signals,
            &mut f.stats,
        );

        assert_eq!(f.buffer.get(1), Some(1));
        assert_eq!(f.buffer.get(2), Some(0));
        assert_eq!(f.scheduler.status(), TxStatus::Idle);
        assert_eq!(f.stats.replies, 2);
    }

    #[test]
    fn out_of_range_address_dropped_not_fatal() {
        let mut f = fixture(WIDTH);
        let mut processor = ReceiveProcessor::new(WIDTH as u8, None);

        await_reply(&mut f);
        processor.process(
            &[encode_reply(0x50, 1)],
            &mut f.scheduler,
            &mut f.buffer,
            &mut f.signals,
            &mut f.stats,
        );

        assert_eq!(f.stats.dropped_out_of_range, 1);
        assert_eq!(f.stats.replies, 0);
        // The request still counts as answered.
        assert_eq!(f.scheduler.status(), TxStatus::Idle);
    }

    #[test]
    fn silence_marks_repeat() {
        let mut f = fixture(WIDTH);
        let mut processor = ReceiveProcessor::new(WIDTH as u8, None);

        await_reply(&mut f);
        processor.process(
            &[],
            &mut f.scheduler,
            &mut f.buffer,
            &mut f.signals,
            &mut f.stats,
        );

        assert_eq!(f.scheduler.status(), TxStatus::Repeat);
        assert_eq!(f.stats.repeats, 1);
        assert_eq!(f.stats.stale_requests, 0);
    }

    #[test]
    fn unsolicited_bytes_discarded() {
        let mut f = fixture(WIDTH);
        let mut processor = ReceiveProcessor::new(WIDTH as u8, None);

        // Nothing outstanding.
        processor.process(
            &[0x81, 0x02, 0x03],
            &mut f.scheduler,
            &mut f.buffer,
            &mut f.signals,
            &mut f.stats,
        );

        assert_eq!(f.stats.discarded_bytes, 3);
        assert_eq!(f.buffer.get(1), Some(0));
    }

    #[test]
    fn stale_request_reported_after_ceiling_then_reset() {
        let mut f = fixture(WIDTH);
        let mut processor = ReceiveProcessor::new(WIDTH as u8, Some(3));

        await_reply(&mut f);
        for _ in 0..3 {
            processor.process(
                &[],
                &mut f.scheduler,
                &mut f.buffer,
                &mut f.signals,
                &mut f.stats,
            );
            // The driver resends and awaits again.
            f.scheduler.tick(&mut f.transport, &mut f.patterns).unwrap();
        }
        assert_eq!(f.stats.stale_requests, 1);
        // Still repeating, never fatal.
        assert_eq!(f.stats.repeats, 3);

        // The counter restarts after the report.
        for _ in 0..2 {
            processor.process(
                &[],
                &mut f.scheduler,
                &mut f.buffer,
                &mut f.signals,
                &mut f.stats,
            );
            f.scheduler.tick(&mut f.transport, &mut f.patterns).unwrap();
        }
        assert_eq!(f.stats.stale_requests, 1);
    }

    #[test]
    fn a_reply_resets_the_miss_counter() {
        let mut f = fixture(WIDTH);
        let mut processor = ReceiveProcessor::new(WIDTH as u8, Some(2));

        await_reply(&mut f);
        processor.process(
            &[],
            &mut f.scheduler,
            &mut f.buffer,
            &mut f.signals,
            &mut f.stats,
        );
        f.scheduler.tick(&mut f.transport, &mut f.patterns).unwrap();
        processor.process(
            &[encode_reply(0, 1)],
            &mut f.scheduler,
            &mut f.buffer,
            &mut f.signals,
            &mut f.stats,
        );

        // One more miss alone must not trip the ceiling of two.
        await_reply(&mut f);
        processor.process(
            &[],
            &mut f.scheduler,
            &mut f.buffer,
            &mut f.signals,
            &mut f.stats,
        );
        assert_eq!(f.stats.stale_requests, 0);
    }

    #[test]
    fn probe_addresses_mirror_into_signal_table() {
        let mut f = fixture(WIDTH);
        f.signals
            .load(
                SignalGroup::Probe,
                [(0, "rx_locked".to_string()), (1, "rx_error".to_string())],
            )
            .unwrap();
        // Addresses 2 and 3 are the probe window.
        let mut processor = ReceiveProcessor::new(2, None);

        await_reply(&mut f);
        processor.process(
            &[encode_reply(2, 1), encode_reply(0, 1)],
            &mut f.scheduler,
            &mut f.buffer,
            &mut f.signals,
            &mut f.stats,
        );

        assert_eq!(f.signals.get(SignalGroup::Probe, 0), Some(1));
        assert_eq!(f.signals.get(SignalGroup::Probe, 1), Some(0));
        // Switch-window addresses never touch the probe group.
        assert_eq!(f.buffer.get(0), Some(1));
    }
}
