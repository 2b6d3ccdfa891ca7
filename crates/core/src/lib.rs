#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod net;
pub mod record;
pub mod sink;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, ConntrackdError, SinkError};

// 설정
pub use config::{
    ConntrackdConfig, JournalConfig, LokiConfig, SinkConfig, StreamConfig, SyslogConfig,
};

// 이벤트
pub use event::{EventKind, FlowEvent, TcpState};

// 네트워크 분류
pub use net::NetClass;

// 레코드
pub use record::{Location, Record};

// 싱크 trait
pub use sink::{BoxFuture, DynSink, Sink};
