pub mod config;
pub mod driver;
pub mod error;
pub mod pattern;
pub mod protocol;
pub mod receiver;
pub mod scheduler;
pub mod signals;
pub mod transport;

pub use config::{LinkConfig, load_config, load_config_or_default};
pub use driver::LinkDriver;
pub use error::LinkError;
pub use pattern::WritePatternTable;
pub use protocol::{Reply, Request, RequestCode, decode_reply, encode_reply};
pub use receiver::{LinkStats, ReceiveBuffer, ReceiveProcessor};
pub use scheduler::{Phase, TransmitScheduler, TxStatus};
pub use signals::{Signal, SignalGroup, SignalTable, parse_signal_text, read_signal_file};
pub use transport::{SerialTransport, Transport};
