//! 에러 타입 — 공용 도메인 에러 정의
//!
//! 설정과 싱크 에러는 여러 크레이트가 함께 사용하므로 core에
//! 정의합니다. 필터/GeoIP/conntrack 크레이트는 자체 에러 타입을
//! 정의하고 데몬 경계에서 `anyhow`로 집계됩니다.

/// conntrackd 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ConntrackdError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 싱크 관련 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 참조된 파일이 존재하지 않음
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 활성화된 싱크가 하나도 없음
    #[error("no sink enabled, at least one sink is required")]
    NoSinkEnabled,
}

/// 싱크 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 싱크 초기화 실패
    #[error("sink '{name}' init failed: {reason}")]
    Init { name: &'static str, reason: String },

    /// 활성화된 싱크 중 초기화에 성공한 것이 없음
    #[error("no target sink available")]
    NoTargetSinkAvailable,

    /// 레코드 발행 실패 (버스에서 흡수되며 호출자로 전파되지 않음)
    #[error("sink '{name}' emit failed: {reason}")]
    Emit { name: &'static str, reason: String },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
