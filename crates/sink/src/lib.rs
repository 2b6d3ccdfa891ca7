#![doc = include_str!("../README.md")]

pub mod bus;
pub mod journal;
pub mod loki;
pub mod stream;
pub mod syslog;

// --- 주요 타입 re-export ---

pub use bus::SinkBus;
pub use journal::JournalSink;
pub use loki::LokiSink;
pub use stream::StreamSink;
pub use syslog::SyslogSink;
