#![doc = include_str!("../README.md")]

pub mod decode;
pub mod error;
pub mod pipeline;
pub mod socket;

// --- 주요 타입 re-export ---

pub use error::ConntrackError;
pub use pipeline::{IngestPipeline, IngestPipelineBuilder};
pub use socket::ConntrackSocket;
