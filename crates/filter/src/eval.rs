//! 평가기 — AST를 이벤트 술어 함수로 컴파일
//!
//! [`compile`]은 표현식 트리를 한 번 순회하며 [`PredicateFunc`]를
//! 만듭니다. 주소 리터럴은 이 단계에서 IP/CIDR로 파싱되어 클로저에
//! 값으로 캡처되므로, 평가 시에는 할당 없이 비교만 수행합니다.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use conntrackd_core::event::FlowEvent;
use conntrackd_core::net::NetClass;

use crate::ast::{BinaryOp, Direction, Expr, PortDirection, UnaryOp};
use crate::error::FilterError;

/// 이벤트에 대한 순수 술어 함수
pub type PredicateFunc = Box<dyn Fn(&FlowEvent) -> bool + Send + Sync>;

/// 컴파일된 주소 매처
///
/// 정확 일치는 같은 패밀리끼리만 성립하고, CIDR 포함 검사도
/// 패밀리가 다르면 항상 거짓입니다.
enum AddrMatcher {
    Exact(IpAddr),
    Cidr(IpNetwork),
}

impl AddrMatcher {
    fn matches(&self, addr: IpAddr) -> bool {
        match self {
            Self::Exact(expected) => *expected == addr,
            Self::Cidr(network) => network.contains(addr),
        }
    }
}

/// 표현식을 술어 함수로 컴파일합니다.
///
/// 유일한 실패 지점은 주소 리터럴 파싱입니다. 그 외 노드는 파서가
/// 이미 검증한 값만 담고 있습니다.
pub fn compile(expr: &Expr) -> Result<PredicateFunc, FilterError> {
    match expr {
        Expr::Binary { op, left, right } => {
            let left = compile(left)?;
            let right = compile(right)?;
            Ok(match op {
                BinaryOp::And => Box::new(move |event| left(event) && right(event)),
                BinaryOp::Or => Box::new(move |event| left(event) || right(event)),
            })
        }

        Expr::Unary {
            op: UnaryOp::Not,
            inner,
        } => {
            let inner = compile(inner)?;
            Ok(Box::new(move |event| !inner(event)))
        }

        Expr::Type { kinds } => {
            let kinds = kinds.clone();
            Ok(Box::new(move |event| kinds.contains(&event.kind)))
        }

        Expr::Protocol { protocols } => {
            let protocols = protocols.clone();
            Ok(Box::new(move |event| {
                protocols.iter().any(|p| p.matches(event.protocol))
            }))
        }

        Expr::Network { direction, classes } => {
            let direction = *direction;
            let classes = classes.clone();
            Ok(Box::new(move |event| {
                let addr = direction_addr(event, direction);
                classes.contains(&NetClass::of(addr))
            }))
        }

        Expr::Address {
            direction,
            addresses,
            ports,
        } => {
            let matchers = addresses
                .iter()
                .map(|addr| compile_addr_matcher(addr))
                .collect::<Result<Vec<_>, _>>()?;
            let direction = *direction;
            let ports = ports.clone();

            Ok(Box::new(move |event| {
                let addr = direction_addr(event, direction);
                if !matchers.iter().any(|m| m.matches(addr)) {
                    return false;
                }
                if ports.is_empty() {
                    return true;
                }
                ports.contains(&direction_port(event, direction))
            }))
        }

        Expr::Port { direction, ports } => {
            let direction = *direction;
            let ports = ports.clone();
            Ok(Box::new(move |event| match direction {
                PortDirection::Source => ports.contains(&event.src_port),
                PortDirection::Destination => ports.contains(&event.dst_port),
                PortDirection::Both => {
                    ports.contains(&event.src_port) || ports.contains(&event.dst_port)
                }
            }))
        }

        Expr::Any => Ok(Box::new(|_| true)),
    }
}

/// 주소 리터럴 하나를 매처로 컴파일합니다.
///
/// `/`를 포함하면 CIDR로, 아니면 정확한 IP로 파싱합니다.
fn compile_addr_matcher(literal: &str) -> Result<AddrMatcher, FilterError> {
    if literal.contains('/') {
        return literal
            .parse::<IpNetwork>()
            .map(AddrMatcher::Cidr)
            .map_err(|e| FilterError::InvalidAddress {
                value: literal.to_owned(),
                reason: e.to_string(),
            });
    }

    literal
        .parse::<IpAddr>()
        .map(AddrMatcher::Exact)
        .map_err(|e| FilterError::InvalidAddress {
            value: literal.to_owned(),
            reason: e.to_string(),
        })
}

fn direction_addr(event: &FlowEvent, direction: Direction) -> IpAddr {
    match direction {
        Direction::Source => event.src_addr,
        Direction::Destination => event.dst_addr,
    }
}

fn direction_port(event: &FlowEvent, direction: Direction) -> u16 {
    match direction {
        Direction::Source => event.src_port,
        Direction::Destination => event.dst_port,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use conntrackd_core::event::{EventKind, IPPROTO_TCP, IPPROTO_UDP};

    fn event(src: &str, dst: &str) -> FlowEvent {
        FlowEvent {
            kind: EventKind::New,
            flow_id: 1,
            protocol: IPPROTO_TCP,
            src_addr: src.parse().unwrap(),
            dst_addr: dst.parse().unwrap(),
            src_port: 1234,
            dst_port: 80,
            tcp_state: None,
        }
    }

    fn predicate(rule: &str) -> PredicateFunc {
        compile(&parse(rule).unwrap().expr).unwrap()
    }

    #[test]
    fn any_matches_everything() {
        let pred = predicate("log any");
        assert!(pred(&event("10.0.0.1", "1.1.1.1")));
    }

    #[test]
    fn type_predicate_matches_kind() {
        let pred = predicate("log type NEW, DESTROY");
        let mut ev = event("10.0.0.1", "1.1.1.1");
        assert!(pred(&ev));
        ev.kind = EventKind::Destroy;
        assert!(pred(&ev));
        ev.kind = EventKind::Update;
        assert!(!pred(&ev));
    }

    #[test]
    fn protocol_predicate_matches_raw_number() {
        let pred = predicate("log protocol UDP");
        let mut ev = event("10.0.0.1", "1.1.1.1");
        assert!(!pred(&ev));
        ev.protocol = IPPROTO_UDP;
        assert!(pred(&ev));
    }

    #[test]
    fn protocol_predicate_ignores_other_protocols() {
        let pred = predicate("log protocol TCP, UDP");
        let mut ev = event("10.0.0.1", "1.1.1.1");
        ev.protocol = 1; // ICMP
        assert!(!pred(&ev));
    }

    #[test]
    fn network_predicate_per_direction() {
        let pred = predicate("log destination network PUBLIC");
        assert!(pred(&event("10.0.0.1", "1.1.1.1")));
        assert!(!pred(&event("1.1.1.1", "10.0.0.1")));

        let pred = predicate("log source network PRIVATE");
        assert!(pred(&event("10.0.0.1", "1.1.1.1")));
        assert!(!pred(&event("1.1.1.1", "10.0.0.1")));
    }

    #[test]
    fn network_classes_partition_every_address() {
        // LOCAL ∪ PRIVATE ∪ PUBLIC ∪ MULTICAST는 모든 주소에 대해 참
        let pred = predicate("log source network LOCAL, PRIVATE, PUBLIC, MULTICAST");
        for src in [
            "127.0.0.1",
            "169.254.0.1",
            "10.1.2.3",
            "192.168.0.1",
            "224.0.0.1",
            "1.2.3.4",
            "::1",
            "fe80::1",
            "fd00::1",
            "ff02::1",
            "2001:4860:4860::8888",
        ] {
            assert!(pred(&event(src, "1.1.1.1")), "class miss for {src}");
        }
    }

    #[test]
    fn exact_address_match() {
        let pred = predicate("log destination address 8.8.8.8");
        assert!(pred(&event("10.0.0.1", "8.8.8.8")));
        assert!(!pred(&event("10.0.0.1", "8.8.4.4")));
    }

    #[test]
    fn cidr_address_match() {
        let pred = predicate("log source address 10.0.0.0/8");
        assert!(pred(&event("10.255.0.1", "1.1.1.1")));
        assert!(!pred(&event("11.0.0.1", "1.1.1.1")));
    }

    #[test]
    fn cidr_never_matches_across_families() {
        let pred = predicate("log source address 10.0.0.0/8");
        assert!(!pred(&event("::ffff:10.0.0.1", "1.1.1.1")));

        let pred = predicate("log source address 2001:db8::/32");
        assert!(!pred(&event("10.0.0.1", "1.1.1.1")));
        assert!(pred(&event("2001:db8::42", "1.1.1.1")));
    }

    #[test]
    fn exact_never_matches_across_families() {
        let pred = predicate("log destination address ::1");
        assert!(!pred(&event("10.0.0.1", "127.0.0.1")));
    }

    #[test]
    fn address_with_port_constraint() {
        let pred = predicate("log destination address 10.19.80.100 on port 53");
        let mut ev = event("10.0.0.1", "10.19.80.100");
        ev.dst_port = 53;
        assert!(pred(&ev));
        ev.dst_port = 80;
        assert!(!pred(&ev));
    }

    #[test]
    fn address_list_is_disjunctive() {
        let pred = predicate("log destination address 8.8.8.8, 9.9.9.9");
        assert!(pred(&event("10.0.0.1", "8.8.8.8")));
        assert!(pred(&event("10.0.0.1", "9.9.9.9")));
        assert!(!pred(&event("10.0.0.1", "1.1.1.1")));
    }

    #[test]
    fn invalid_address_fails_compilation() {
        let rule = parse("log destination address 999.999.999.999").unwrap();
        let err = match compile(&rule.expr) {
            Err(err) => err,
            Ok(_) => panic!("expected compilation to fail"),
        };
        assert!(matches!(err, FilterError::InvalidAddress { .. }));
    }

    #[test]
    fn invalid_cidr_fails_compilation() {
        let rule = parse("log destination address 10.0.0.0/33").unwrap();
        let err = match compile(&rule.expr) {
            Err(err) => err,
            Ok(_) => panic!("expected compilation to fail"),
        };
        assert!(matches!(err, FilterError::InvalidAddress { .. }));
    }

    #[test]
    fn port_range_membership() {
        let pred = predicate("log destination port 8000-8005");
        let mut ev = event("10.0.0.1", "1.1.1.1");
        ev.dst_port = 8003;
        assert!(pred(&ev));
        ev.dst_port = 8006;
        assert!(!pred(&ev));
    }

    #[test]
    fn both_direction_port_matches_either_side() {
        let pred = predicate("log on port 1234");
        // 출발지 포트가 1234
        assert!(pred(&event("10.0.0.1", "1.1.1.1")));
        let mut ev = event("10.0.0.1", "1.1.1.1");
        ev.src_port = 9;
        ev.dst_port = 1234;
        assert!(pred(&ev));
        ev.dst_port = 80;
        assert!(!pred(&ev));
    }

    #[test]
    fn not_is_logical_complement() {
        // evaluate(not e) == !evaluate(e)
        for (plain, negated) in [
            ("log type NEW", "log not type NEW"),
            ("log protocol TCP", "log not protocol TCP"),
            ("log destination network PUBLIC", "log not destination network PUBLIC"),
        ] {
            let p = predicate(plain);
            let n = predicate(negated);
            let ev = event("10.0.0.1", "1.1.1.1");
            assert_eq!(p(&ev), !n(&ev), "{plain} vs {negated}");
        }
    }

    #[test]
    fn and_or_follow_boolean_semantics() {
        let a = predicate("log type NEW");
        let b = predicate("log protocol TCP");
        let and = predicate("log type NEW and protocol TCP");
        let or = predicate("log type NEW or protocol TCP");

        let mut ev = event("10.0.0.1", "1.1.1.1");
        for (kind, protocol) in [
            (EventKind::New, IPPROTO_TCP),
            (EventKind::New, IPPROTO_UDP),
            (EventKind::Update, IPPROTO_TCP),
            (EventKind::Update, IPPROTO_UDP),
        ] {
            ev.kind = kind;
            ev.protocol = protocol;
            assert_eq!(and(&ev), a(&ev) && b(&ev));
            assert_eq!(or(&ev), a(&ev) || b(&ev));
        }
    }

    #[test]
    fn double_negation_cancels() {
        let pred = predicate("log not (not type NEW)");
        let plain = predicate("log type NEW");
        let ev = event("10.0.0.1", "1.1.1.1");
        assert_eq!(pred(&ev), plain(&ev));
    }
}
