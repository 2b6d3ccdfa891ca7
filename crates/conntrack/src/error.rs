//! conntrack 도메인 에러 타입

/// conntrack 구독/파이프라인 에러
#[derive(Debug, thiserror::Error)]
pub enum ConntrackError {
    /// 넷링크 소켓 열기/옵션/바인드 실패 (치명적)
    #[error("conntrack socket error: {reason}")]
    Socket {
        /// 실패 사유
        reason: String,
        /// 원인 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 수신 중 치명적 스트림 에러 (종료 트리거)
    #[error("conntrack listener error: {0}")]
    Listener(#[from] std::io::Error),

    /// 넷링크 메시지 디코딩 실패 (이벤트 단위로 흡수)
    #[error("failed to decode conntrack message: {0}")]
    Decode(String),

    /// 파이프라인 조립 실패 (필수 구성 요소 누락)
    #[error("pipeline init failed: {0}")]
    Init(String),
}

impl ConntrackError {
    /// 소켓 단계 에러를 생성합니다.
    pub fn socket(reason: impl Into<String>, source: std::io::Error) -> Self {
        Self::Socket {
            reason: reason.into(),
            source,
        }
    }

    /// 디코딩 에러를 생성합니다.
    pub fn decode(reason: impl ToString) -> Self {
        Self::Decode(reason.to_string())
    }
}
