//! Byte transport underneath the protocol engine.

use crate::error::LinkError;
use std::io::{Read, Write};
use std::time::Duration;

/// Maximum bytes drained from the transport per poll.
pub const POLL_CHUNK: usize = 10;

/// Half-duplex byte pipe to the device.
///
/// `send` is best effort: a partial write is surfaced to the caller, never
/// retried here. `poll` must not block; it returns whatever the transport
/// has buffered, byte-granular, with no alignment to request boundaries.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, LinkError>;
    fn poll(&mut self, max: usize) -> Result<Vec<u8>, LinkError>;
}

/// Serial-port transport. 8 data bits, no parity, one stop bit.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open `port_name` at `baud`. Failure here is fatal at startup.
    pub fn open(port_name: &str, baud: u32) -> Result<Self, LinkError> {
        let port = serialport::new(port_name, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|e| LinkError::PortUnavailable(format!("{port_name}: {e}")))?;
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, LinkError> {
        Ok(self.port.write(bytes)?)
    }

    fn poll(&mut self, max: usize) -> Result<Vec<u8>, LinkError> {
        let mut buf = vec![0u8; max];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            // A drained port is the common case, not an error.
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}
