use crate::signals::SignalGroup;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("serial port unavailable: {0}")]
    PortUnavailable(String),
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("address {0:#04x} does not fit in the 7-bit address field")]
    InvalidAddress(u8),
    #[error("data width {0} exceeds the 128-slot address space")]
    DataWidth(usize),
    #[error("pattern table has no rows")]
    EmptyPattern,
    #[error("pattern row {row} is {len} entries wide, expected {expected}")]
    PatternShape {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("duplicate {group} signal index {index}")]
    DuplicateSignal { group: SignalGroup, index: u8 },
    #[error("{group} signal index {index} out of range")]
    SignalOutOfRange { group: SignalGroup, index: u8 },
    #[error("signal file {origin}, line {line}: {reason}")]
    SignalFile {
        origin: String,
        line: usize,
        reason: String,
    },
    #[error("shutdown hook registration failed: {0}")]
    ShutdownHook(String),
}
