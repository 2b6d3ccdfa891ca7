//! 필터 — 규칙 목록의 빌드와 첫 매칭 우선 평가
//!
//! [`Filter`]는 컴파일된 규칙의 순서 있는 목록입니다. 평가는 첫
//! 매칭 규칙에서 멈추고 그 액션이 결정하며, 어떤 규칙도 매칭되지
//! 않으면 기본 기록(log-by-default)입니다.

use std::fmt;

use conntrackd_core::event::FlowEvent;

use crate::ast::{Action, Rule};
use crate::error::FilterError;
use crate::eval::{compile, PredicateFunc};
use crate::parser::Parser;

/// 컴파일된 규칙 하나
///
/// 진단을 위해 규칙 원문을 함께 보관합니다.
pub struct CompiledRule {
    /// 파싱된 규칙 (액션 + AST)
    pub rule: Rule,
    /// 컴파일된 술어
    pub predicate: PredicateFunc,
    /// 규칙 원문
    pub text: String,
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("action", &self.rule.action)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

/// 평가 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// 어떤 규칙이라도 매칭되었는지
    pub matched: bool,
    /// 이벤트를 기록해야 하는지
    pub should_log: bool,
    /// 매칭된 규칙의 0 기반 인덱스 (매칭 없으면 None)
    pub rule_index: Option<usize>,
}

impl Verdict {
    /// 매칭 없음: 기본 기록
    const DEFAULT_LOG: Self = Self {
        matched: false,
        should_log: true,
        rule_index: None,
    };
}

/// 컴파일된 필터
///
/// 생성 이후 불변이며 태스크 간 공유 참조로 전달됩니다.
#[derive(Debug, Default)]
pub struct Filter {
    rules: Vec<CompiledRule>,
}

impl Filter {
    /// 규칙 문자열 목록으로 필터를 빌드합니다.
    ///
    /// 렉싱/파싱/컴파일 중 어느 단계든 실패하면 해당 규칙의 인덱스와
    /// 원문이 에러에 부착됩니다.
    pub fn build<S: AsRef<str>>(rule_strings: &[S]) -> Result<Self, FilterError> {
        let mut rules = Vec::with_capacity(rule_strings.len());

        for (index, text) in rule_strings.iter().enumerate() {
            let text = text.as_ref();

            let rule = Parser::new(text)
                .and_then(|mut p| p.parse_rule())
                .map_err(|e| e.for_rule(index, text))?;

            let predicate = compile(&rule.expr).map_err(|e| e.for_rule(index, text))?;

            rules.push(CompiledRule {
                rule,
                predicate,
                text: text.to_owned(),
            });
        }

        Ok(Self { rules })
    }

    /// 이벤트를 평가합니다.
    ///
    /// 빈 필터는 항상 `(matched=false, should_log=true, None)`입니다.
    pub fn evaluate(&self, event: &FlowEvent) -> Verdict {
        for (index, compiled) in self.rules.iter().enumerate() {
            if (compiled.predicate)(event) {
                return Verdict {
                    matched: true,
                    should_log: compiled.rule.action == Action::Log,
                    rule_index: Some(index),
                };
            }
        }

        Verdict::DEFAULT_LOG
    }

    /// 규칙 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 규칙 원문 목록을 반환합니다 (시작 로그에 사용).
    pub fn rule_texts(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.text.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conntrackd_core::event::{EventKind, IPPROTO_TCP, IPPROTO_UDP};

    fn event(dst: &str, dst_port: u16) -> FlowEvent {
        FlowEvent {
            kind: EventKind::New,
            flow_id: 9,
            protocol: IPPROTO_TCP,
            src_addr: "10.0.0.1".parse().unwrap(),
            dst_addr: dst.parse().unwrap(),
            src_port: 1234,
            dst_port,
            tcp_state: None,
        }
    }

    #[test]
    fn empty_filter_logs_by_default() {
        let filter = Filter::build::<&str>(&[]).unwrap();
        let verdict = filter.evaluate(&event("1.1.1.1", 80));
        assert_eq!(
            verdict,
            Verdict {
                matched: false,
                should_log: true,
                rule_index: None,
            }
        );
    }

    #[test]
    fn no_match_logs_by_default() {
        let filter = Filter::build(&["drop destination address 8.8.8.8"]).unwrap();
        let verdict = filter.evaluate(&event("1.1.1.1", 80));
        assert!(!verdict.matched);
        assert!(verdict.should_log);
        assert_eq!(verdict.rule_index, None);
    }

    #[test]
    fn drop_rule_suppresses_logging() {
        let filter = Filter::build(&["drop destination address 8.8.8.8"]).unwrap();
        let verdict = filter.evaluate(&event("8.8.8.8", 80));
        assert_eq!(
            verdict,
            Verdict {
                matched: true,
                should_log: false,
                rule_index: Some(0),
            }
        );
    }

    #[test]
    fn first_match_wins() {
        // 첫 규칙이 매칭되면 뒤의 drop은 고려되지 않음
        let filter = Filter::build(&[
            "log protocol TCP",
            "drop destination address 8.8.8.8",
        ])
        .unwrap();
        let verdict = filter.evaluate(&event("8.8.8.8", 443));
        assert_eq!(
            verdict,
            Verdict {
                matched: true,
                should_log: true,
                rule_index: Some(0),
            }
        );
    }

    #[test]
    fn later_rule_matches_when_earlier_misses() {
        let filter = Filter::build(&[
            "log protocol UDP",
            "drop destination address 8.8.8.8",
        ])
        .unwrap();
        let verdict = filter.evaluate(&event("8.8.8.8", 443));
        assert_eq!(verdict.rule_index, Some(1));
        assert!(!verdict.should_log);
    }

    #[test]
    fn rule_order_is_observable() {
        let forward = Filter::build(&["log any", "drop any"]).unwrap();
        let backward = Filter::build(&["drop any", "log any"]).unwrap();
        let ev = event("1.1.1.1", 80);
        assert!(forward.evaluate(&ev).should_log);
        assert!(!backward.evaluate(&ev).should_log);
    }

    #[test]
    fn build_error_carries_rule_index() {
        let err = Filter::build(&["log any", "log protocol ICMP"]).unwrap_err();
        match err {
            FilterError::Rule { index, rule, .. } => {
                assert_eq!(index, 1);
                assert_eq!(rule, "log protocol ICMP");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn compile_error_carries_rule_index() {
        let err = Filter::build(&["drop destination address 10.0.0.0/99"]).unwrap_err();
        match err {
            FilterError::Rule { index, source, .. } => {
                assert_eq!(index, 0);
                assert!(matches!(*source, FilterError::InvalidAddress { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn scenario_public_destination() {
        let filter = Filter::build(&["log protocol TCP and destination network PUBLIC"]).unwrap();
        let verdict = filter.evaluate(&event("1.1.1.1", 80));
        assert_eq!(
            verdict,
            Verdict {
                matched: true,
                should_log: true,
                rule_index: Some(0),
            }
        );
    }

    #[test]
    fn scenario_address_on_port() {
        let filter = Filter::build(&["log destination address 10.19.80.100 on port 53"]).unwrap();
        assert!(filter.evaluate(&event("10.19.80.100", 53)).matched);
        assert!(!filter.evaluate(&event("10.19.80.100", 80)).matched);
    }

    #[test]
    fn scenario_port_range() {
        let filter = Filter::build(&["log destination port 8000-8005"]).unwrap();
        assert!(filter.evaluate(&event("1.1.1.1", 8003)).matched);
        assert!(!filter.evaluate(&event("1.1.1.1", 8006)).matched);
    }

    #[test]
    fn udp_event_against_tcp_rule() {
        let filter = Filter::build(&["log protocol TCP"]).unwrap();
        let mut ev = event("1.1.1.1", 80);
        ev.protocol = IPPROTO_UDP;
        let verdict = filter.evaluate(&ev);
        assert!(!verdict.matched);
        assert!(verdict.should_log); // 기본 기록
    }

    #[test]
    fn rule_texts_preserved() {
        let rules = ["log any", "drop protocol UDP"];
        let filter = Filter::build(&rules).unwrap();
        assert_eq!(filter.len(), 2);
        assert_eq!(filter.rule_texts(), vec!["log any", "drop protocol UDP"]);
    }
}
