//! 이벤트 모델 — 커널 conntrack 알림의 정규화된 표현
//!
//! 넷링크 디코더가 커널 메시지를 [`FlowEvent`]로 변환하며, 이후 필터
//! 평가와 레코드 포맷팅은 모두 이 불변 구조체 위에서 수행됩니다.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// IP 프로토콜 번호: TCP
pub const IPPROTO_TCP: u8 = 6;
/// IP 프로토콜 번호: UDP
pub const IPPROTO_UDP: u8 = 17;

/// conntrack 이벤트 종류
///
/// 커널이 플로우 상태 변화를 알리는 세 가지 알림 유형에 대응합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// 새 플로우가 추적 테이블에 등록됨
    New,
    /// 기존 플로우의 상태가 갱신됨
    Update,
    /// 플로우가 추적 테이블에서 제거됨
    Destroy,
}

impl EventKind {
    /// 레코드에 기록되는 대문자 표기를 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Update => "UPDATE",
            Self::Destroy => "DESTROY",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 커널 TCP 연결 상태
///
/// `nf_conntrack_tcp`가 보고하는 상태 값과 1:1 대응합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TcpState {
    None,
    SynSent,
    SynRecv,
    Established,
    FinWait,
    CloseWait,
    LastAck,
    TimeWait,
    Close,
}

impl TcpState {
    /// 커널이 보고한 원시 상태 값을 변환합니다.
    ///
    /// 알려지지 않은 값은 `None`을 반환합니다 (커널 버전에 따라
    /// 추가 상태가 보고될 수 있음).
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::SynSent),
            2 => Some(Self::SynRecv),
            3 => Some(Self::Established),
            4 => Some(Self::FinWait),
            5 => Some(Self::CloseWait),
            6 => Some(Self::LastAck),
            7 => Some(Self::TimeWait),
            8 => Some(Self::Close),
            _ => None,
        }
    }

    /// 레코드에 기록되는 대문자 표기를 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::SynSent => "SYN_SENT",
            Self::SynRecv => "SYN_RECV",
            Self::Established => "ESTABLISHED",
            Self::FinWait => "FIN_WAIT",
            Self::CloseWait => "CLOSE_WAIT",
            Self::LastAck => "LAST_ACK",
            Self::TimeWait => "TIME_WAIT",
            Self::Close => "CLOSE",
        }
    }
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 정규화된 conntrack 이벤트
///
/// 넷링크 디코더가 생성한 이후 변경되지 않으며, 레코드 포맷팅이 끝나면
/// 폐기됩니다. 주소는 원본 방향(tuple orig) 기준입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEvent {
    /// 이벤트 종류
    pub kind: EventKind,
    /// 커널이 부여한 플로우 ID
    pub flow_id: u32,
    /// 원시 IP 프로토콜 번호 (TCP=6, UDP=17, 그 외는 파이프라인에서 무시)
    pub protocol: u8,
    /// 출발지 주소
    pub src_addr: IpAddr,
    /// 목적지 주소
    pub dst_addr: IpAddr,
    /// 출발지 포트
    pub src_port: u16,
    /// 목적지 포트
    pub dst_port: u16,
    /// TCP 연결 상태 (TCP 프로토콜 정보가 있는 경우에만)
    pub tcp_state: Option<TcpState>,
}

impl FlowEvent {
    /// TCP 플로우인지 확인합니다.
    pub fn is_tcp(&self) -> bool {
        self.protocol == IPPROTO_TCP
    }

    /// UDP 플로우인지 확인합니다.
    pub fn is_udp(&self) -> bool {
        self.protocol == IPPROTO_UDP
    }

    /// 레코드에 기록되는 프로토콜 표기를 반환합니다.
    ///
    /// TCP/UDP 외의 프로토콜은 빈 문자열입니다.
    pub fn protocol_name(&self) -> &'static str {
        match self.protocol {
            IPPROTO_TCP => "TCP",
            IPPROTO_UDP => "UDP",
            _ => "",
        }
    }

    /// `호스트:포트` 형태의 출발지 엔드포인트 표기를 반환합니다.
    pub fn src_endpoint(&self) -> String {
        format_endpoint(self.src_addr, self.src_port)
    }

    /// `호스트:포트` 형태의 목적지 엔드포인트 표기를 반환합니다.
    pub fn dst_endpoint(&self) -> String {
        format_endpoint(self.dst_addr, self.dst_port)
    }
}

impl fmt::Display for FlowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FlowEvent[{}] {} {} -> {} proto={}",
            self.flow_id,
            self.kind,
            self.src_endpoint(),
            self.dst_endpoint(),
            self.protocol,
        )
    }
}

/// 주소와 포트를 엔드포인트 문자열로 조합합니다.
///
/// IPv6 주소는 포트와 구분하기 위해 대괄호로 감쌉니다.
pub fn format_endpoint(addr: IpAddr, port: u16) -> String {
    match addr {
        IpAddr::V4(v4) => format!("{v4}:{port}"),
        IpAddr::V6(v6) => format!("[{v6}]:{port}"),
    }
}
