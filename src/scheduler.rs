//! Transmit side of the link.
//!
//! Walks the address space in alternating sweeps — read everything, then
//! write everything from the active pattern row — with a single request in
//! flight at any time. The read sweep snapshots device state before a
//! write sweep starts, and each completed write sweep commits exactly one
//! pattern row, so the device only ever observes complete rows.

use crate::error::LinkError;
use crate::pattern::WritePatternTable;
use crate::protocol::{Request, RequestCode};
use crate::transport::Transport;
use log::trace;

/// Which sweep the transmitter is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Read,
    Write,
}

/// Transmitter status. The scheduler only ever moves this to
/// `AwaitingReply`; the receive side moves it back to `Idle` or `Repeat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Idle,
    AwaitingReply,
    Repeat,
}

pub struct TransmitScheduler {
    data_width: u8,
    phase: Phase,
    cursor: u8,
    status: TxStatus,
    last_request: Option<Request>,
}

impl TransmitScheduler {
    /// `data_width` is the number of wire addresses, at most 128.
    pub fn new(data_width: u8) -> Self {
        Self {
            data_width,
            phase: Phase::Read,
            cursor: 0,
            status: TxStatus::Idle,
            last_request: None,
        }
    }

    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Resolution of the outstanding request, driven by the receive side.
    pub fn set_status(&mut self, status: TxStatus) {
        self.status = status;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    pub fn last_request(&self) -> Option<Request> {
        self.last_request
    }

    /// Emit at most one request. `Idle` builds the next request from the
    /// sweep position, `Repeat` re-sends the previous request unchanged,
    /// `AwaitingReply` emits nothing. Returns the emitted request, if any.
    pub fn tick(
        &mut self,
        transport: &mut dyn Transport,
        patterns: &mut WritePatternTable,
    ) -> Result<Option<Request>, LinkError> {
        match self.status {
            TxStatus::AwaitingReply => Ok(None),
            TxStatus::Repeat => {
                // Byte-identical resend; the cursor already moved past
                // this address when the request first went out.
                let Some(request) = self.last_request else {
                    return Ok(None);
                };
                trace!("repeat {:?} addr {}", request.code(), request.address());
                send_request(transport, &request)?;
                self.status = TxStatus::AwaitingReply;
                Ok(Some(request))
            }
            TxStatus::Idle => {
                let code = match self.phase {
                    Phase::Read => RequestCode::Read,
                    Phase::Write => {
                        RequestCode::write_for(patterns.current()[self.cursor as usize])
                    }
                };
                let request = Request::new(code, self.cursor)?;
                trace!("send {:?} addr {}", request.code(), request.address());
                send_request(transport, &request)?;
                self.last_request = Some(request);
                // Writes elicit no device reply; their acknowledgment is
                // immediate. Only reads leave a request outstanding.
                self.status = if request.expects_reply() {
                    TxStatus::AwaitingReply
                } else {
                    TxStatus::Idle
                };
                self.advance(patterns);
                Ok(Some(request))
            }
        }
    }

    fn advance(&mut self, patterns: &mut WritePatternTable) {
        if u16::from(self.cursor) + 1 < u16::from(self.data_width) {
            self.cursor += 1;
            return;
        }
        self.cursor = 0;
        self.phase = match self.phase {
            Phase::Read => Phase::Write,
            Phase::Write => {
                patterns.advance();
                Phase::Read
            }
        };
    }
}

fn send_request(transport: &mut dyn Transport, request: &Request) -> Result<(), LinkError> {
    let bytes = request.encode();
    let written = transport.send(&bytes)?;
    if written != bytes.len() {
        return Err(LinkError::ShortWrite {
            written,
            expected: bytes.len(),
        });
    }
    Ok(())
}
