//! 로깅 레코드 — 이벤트를 구조화된 속성 집합으로 투영
//!
//! [`Record`]는 싱크로 전달되는 최종 형태입니다. 필수 키와 선택적
//! TCP 상태, 방향별 위치 정보 키를 결정적으로 생성합니다.

use serde::{Deserialize, Serialize};

use crate::event::FlowEvent;

/// GeoIP 조회 결과
///
/// 데이터베이스가 의미 있는 값을 보고한 필드만 채워집니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// 국가 이름 (영문)
    pub country: Option<String>,
    /// 도시 이름 (영문)
    pub city: Option<String>,
    /// 위도
    pub latitude: Option<f64>,
    /// 경도
    pub longitude: Option<f64>,
}

impl Location {
    /// 모든 필드가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.city.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

/// 싱크로 전달되는 구조화된 레코드
///
/// `fields`는 삽입 순서를 유지하지만, 싱크 간 필드 순서는 의미를
/// 갖지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// 사람이 읽는 요약 메시지
    pub message: String,
    /// 키-값 속성 목록
    pub fields: Vec<(String, String)>,
}

impl Record {
    /// 이벤트와 방향별 위치 정보로 레코드를 생성합니다.
    ///
    /// 필수 키는 항상 포함되며, `tcp_state`는 이벤트가 TCP 프로토콜
    /// 정보를 가질 때만, 위치 키는 해당 방향의 조회가 데이터를 반환한
    /// 경우에만 추가됩니다.
    pub fn from_event(
        event: &FlowEvent,
        src_location: Option<&Location>,
        dst_location: Option<&Location>,
    ) -> Self {
        let mut fields = vec![
            ("type".to_owned(), event.kind.as_str().to_owned()),
            ("flow".to_owned(), event.flow_id.to_string()),
            ("prot".to_owned(), event.protocol_name().to_owned()),
            ("src_addr".to_owned(), event.src_addr.to_string()),
            ("dst_addr".to_owned(), event.dst_addr.to_string()),
            ("src_port".to_owned(), event.src_port.to_string()),
            ("dst_port".to_owned(), event.dst_port.to_string()),
        ];

        if let Some(state) = event.tcp_state {
            fields.push(("tcp_state".to_owned(), state.as_str().to_owned()));
        }

        push_location(&mut fields, "src", src_location);
        push_location(&mut fields, "dst", dst_location);

        let message = format!(
            "{} {} connection from {} to {}",
            event.kind,
            event.protocol_name(),
            event.src_endpoint(),
            event.dst_endpoint(),
        );

        Self { message, fields }
    }

    /// 키로 필드 값을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 방향 접두사를 붙여 위치 필드를 추가합니다.
fn push_location(fields: &mut Vec<(String, String)>, prefix: &str, location: Option<&Location>) {
    let Some(location) = location else {
        return;
    };

    if let Some(ref country) = location.country {
        fields.push((format!("{prefix}_country"), country.clone()));
    }
    if let Some(ref city) = location.city {
        fields.push((format!("{prefix}_city"), city.clone()));
    }
    if let Some(lat) = location.latitude {
        fields.push((format!("{prefix}_lat"), lat.to_string()));
    }
    if let Some(lon) = location.longitude {
        fields.push((format!("{prefix}_lon"), lon.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, TcpState, IPPROTO_TCP, IPPROTO_UDP};

    fn sample_event() -> FlowEvent {
        FlowEvent {
            kind: EventKind::New,
            flow_id: 7,
            protocol: IPPROTO_TCP,
            src_addr: "10.0.0.1".parse().unwrap(),
            dst_addr: "1.1.1.1".parse().unwrap(),
            src_port: 1234,
            dst_port: 80,
            tcp_state: Some(TcpState::Established),
        }
    }

    #[test]
    fn required_keys_are_present() {
        let record = Record::from_event(&sample_event(), None, None);
        for key in [
            "type", "flow", "prot", "src_addr", "dst_addr", "src_port", "dst_port",
        ] {
            assert!(record.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(record.get("type"), Some("NEW"));
        assert_eq!(record.get("prot"), Some("TCP"));
        assert_eq!(record.get("flow"), Some("7"));
        assert_eq!(record.get("src_port"), Some("1234"));
    }

    #[test]
    fn tcp_state_included_for_tcp() {
        let record = Record::from_event(&sample_event(), None, None);
        assert_eq!(record.get("tcp_state"), Some("ESTABLISHED"));
    }

    #[test]
    fn tcp_state_omitted_without_proto_info() {
        let mut event = sample_event();
        event.protocol = IPPROTO_UDP;
        event.tcp_state = None;
        let record = Record::from_event(&event, None, None);
        assert_eq!(record.get("tcp_state"), None);
    }

    #[test]
    fn message_format() {
        let record = Record::from_event(&sample_event(), None, None);
        assert_eq!(
            record.message,
            "NEW TCP connection from 10.0.0.1:1234 to 1.1.1.1:80"
        );
    }

    #[test]
    fn ipv6_message_brackets_hosts() {
        let mut event = sample_event();
        event.src_addr = "2001:db8::1".parse().unwrap();
        let record = Record::from_event(&event, None, None);
        assert!(record.message.contains("[2001:db8::1]:1234"));
    }

    #[test]
    fn location_fields_per_direction() {
        let dst = Location {
            country: Some("Australia".to_owned()),
            city: Some("Sydney".to_owned()),
            latitude: Some(-33.86),
            longitude: Some(151.2),
        };
        let record = Record::from_event(&sample_event(), None, Some(&dst));
        assert_eq!(record.get("dst_country"), Some("Australia"));
        assert_eq!(record.get("dst_city"), Some("Sydney"));
        assert_eq!(record.get("dst_lat"), Some("-33.86"));
        assert_eq!(record.get("dst_lon"), Some("151.2"));
        assert_eq!(record.get("src_country"), None);
    }

    #[test]
    fn partial_location_adds_only_present_fields() {
        let loc = Location {
            country: Some("Germany".to_owned()),
            ..Default::default()
        };
        let record = Record::from_event(&sample_event(), Some(&loc), None);
        assert_eq!(record.get("src_country"), Some("Germany"));
        assert_eq!(record.get("src_city"), None);
        assert_eq!(record.get("src_lat"), None);
    }

    #[test]
    fn location_is_empty() {
        assert!(Location::default().is_empty());
        let loc = Location {
            city: Some("Berlin".to_owned()),
            ..Default::default()
        };
        assert!(!loc.is_empty());
    }
}
