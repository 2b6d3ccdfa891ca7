//! 규칙 AST — 표현식과 술어의 합 타입
//!
//! 파서가 생성하고 [`eval`](crate::eval)이 소비합니다. 열거형 값 필드
//! (이벤트 타입, 프로토콜, 네트워크 분류)는 파싱 시점에 검증을 마친
//! 타입으로 저장되며, 주소 리터럴만 컴파일 시점에 파싱됩니다.

use std::fmt;

use conntrackd_core::event::{EventKind, IPPROTO_TCP, IPPROTO_UDP};
use conntrackd_core::net::NetClass;

/// 규칙 매칭 시 취할 액션
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 이벤트를 기록
    Log,
    /// 이벤트를 버림
    Drop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => f.write_str("log"),
            Self::Drop => f.write_str("drop"),
        }
    }
}

/// 이항 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
}

/// 단항 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// 방향 지정 술어의 대상 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Source,
    Destination,
}

/// 포트 술어의 대상 방향
///
/// `on port`(방향 없음)는 출발지/목적지 어느 쪽이든 매칭합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Source,
    Destination,
    Both,
}

/// 필터가 다루는 전송 프로토콜
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proto {
    Tcp,
    Udp,
}

impl Proto {
    /// 원시 IP 프로토콜 번호와 비교합니다.
    ///
    /// TCP/UDP 외의 번호는 어떤 값과도 매칭되지 않습니다.
    pub fn matches(&self, protocol: u8) -> bool {
        match self {
            Self::Tcp => protocol == IPPROTO_TCP,
            Self::Udp => protocol == IPPROTO_UDP,
        }
    }
}

/// 표현식 노드
///
/// 단일 합 타입으로 이항/단항 연산과 모든 술어를 표현합니다.
/// 리터럴 목록(이벤트 타입, 프로토콜, 분류, 주소, 포트)은 파서가
/// 비어 있지 않음을 보장합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// AND/OR 결합
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// NOT
    Unary { op: UnaryOp, inner: Box<Expr> },
    /// `type NEW, UPDATE, DESTROY`
    Type { kinds: Vec<EventKind> },
    /// `protocol TCP, UDP`
    Protocol { protocols: Vec<Proto> },
    /// `source|destination network LOCAL, PRIVATE, PUBLIC, MULTICAST`
    Network {
        direction: Direction,
        classes: Vec<NetClass>,
    },
    /// `source|destination address <ip|cidr>[, ...] [on port <spec>]`
    ///
    /// 주소는 원문 그대로 저장되며 컴파일 시 IP/CIDR로 파싱됩니다.
    /// `ports`가 비어 있으면 포트 제약이 없습니다.
    Address {
        direction: Direction,
        addresses: Vec<String>,
        ports: Vec<u16>,
    },
    /// `source|destination port <spec>` 또는 `on port <spec>`
    Port {
        direction: PortDirection,
        ports: Vec<u16>,
    },
    /// `any` — 모든 이벤트에 매칭
    Any,
}

/// 완전한 필터 규칙: 액션 + 표현식
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// 매칭 시 액션
    pub action: Action,
    /// 술어 표현식
    pub expr: Expr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_display() {
        assert_eq!(Action::Log.to_string(), "log");
        assert_eq!(Action::Drop.to_string(), "drop");
    }

    #[test]
    fn proto_matches_raw_numbers() {
        assert!(Proto::Tcp.matches(6));
        assert!(Proto::Udp.matches(17));
        assert!(!Proto::Tcp.matches(17));
        assert!(!Proto::Udp.matches(6));
        // ICMP는 어느 쪽에도 매칭되지 않음
        assert!(!Proto::Tcp.matches(1));
        assert!(!Proto::Udp.matches(1));
    }

    #[test]
    fn expr_equality() {
        let a = Expr::Type {
            kinds: vec![conntrackd_core::EventKind::New],
        };
        let b = Expr::Type {
            kinds: vec![conntrackd_core::EventKind::New],
        };
        assert_eq!(a, b);
    }
}
