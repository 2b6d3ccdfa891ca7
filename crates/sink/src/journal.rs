//! systemd 저널 싱크
//!
//! `/run/systemd/journal/socket`에 네이티브 datagram 프로토콜로
//! 기록합니다. 레코드의 각 속성은 `EVENT_` 접두사가 붙은 저널
//! 필드가 됩니다.

use tokio::net::UnixDatagram;

use conntrackd_core::error::SinkError;
use conntrackd_core::record::Record;
use conntrackd_core::sink::Sink;

/// 저널 네이티브 소켓 경로
const JOURNAL_SOCKET: &str = "/run/systemd/journal/socket";

/// 레코드 속성 필드의 접두사
const FIELD_PREFIX: &str = "EVENT";

/// syslog severity: informational
const PRIORITY_INFO: &str = "6";

/// systemd 저널 싱크
pub struct JournalSink {
    socket: UnixDatagram,
}

impl JournalSink {
    /// 저널 소켓에 연결합니다.
    ///
    /// journald가 없는 시스템에서는 연결이 실패하고 버스가 경고 후
    /// 이 싱크를 건너뜁니다.
    pub fn new() -> Result<Self, SinkError> {
        Self::with_socket_path(JOURNAL_SOCKET)
    }

    fn with_socket_path(path: &str) -> Result<Self, SinkError> {
        let socket = UnixDatagram::unbound().map_err(|e| SinkError::Init {
            name: "journal",
            reason: e.to_string(),
        })?;
        socket.connect(path).map_err(|e| SinkError::Init {
            name: "journal",
            reason: format!("connect {path}: {e}"),
        })?;
        Ok(Self { socket })
    }
}

impl Sink for JournalSink {
    fn name(&self) -> &'static str {
        "journal"
    }

    async fn emit(&self, record: &Record) -> Result<(), SinkError> {
        let payload = encode_entry(record);
        self.socket
            .send(&payload)
            .await
            .map_err(|e| SinkError::Emit {
                name: "journal",
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// 레코드를 저널 와이어 형식으로 인코딩합니다.
///
/// 값에 개행이 없으면 `KEY=value\n`, 있으면 `KEY\n` 뒤에 LE u64
/// 길이와 원문이 옵니다. 필드 키는 대문자로 정규화됩니다.
fn encode_entry(record: &Record) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    append_field(&mut buf, "MESSAGE", &record.message);
    append_field(&mut buf, "PRIORITY", PRIORITY_INFO);
    append_field(&mut buf, "SYSLOG_IDENTIFIER", "conntrackd");

    for (key, value) in &record.fields {
        let field = format!("{FIELD_PREFIX}_{}", sanitize_key(key));
        append_field(&mut buf, &field, value);
    }

    buf
}

/// 필드 하나를 버퍼에 추가합니다.
fn append_field(buf: &mut Vec<u8>, key: &str, value: &str) {
    buf.extend_from_slice(key.as_bytes());
    if value.contains('\n') {
        buf.push(b'\n');
        buf.extend_from_slice(&(value.len() as u64).to_le_bytes());
        buf.extend_from_slice(value.as_bytes());
    } else {
        buf.push(b'=');
        buf.extend_from_slice(value.as_bytes());
    }
    buf.push(b'\n');
}

/// 저널 필드 키 규칙(`[A-Z0-9_]`)에 맞춰 키를 정규화합니다.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conntrackd_core::event::{EventKind, FlowEvent, IPPROTO_TCP};

    fn sample_record() -> Record {
        let event = FlowEvent {
            kind: EventKind::New,
            flow_id: 5,
            protocol: IPPROTO_TCP,
            src_addr: "10.0.0.1".parse().unwrap(),
            dst_addr: "1.1.1.1".parse().unwrap(),
            src_port: 1000,
            dst_port: 80,
            tcp_state: None,
        };
        Record::from_event(&event, None, None)
    }

    #[test]
    fn encode_contains_required_journal_fields() {
        let encoded = encode_entry(&sample_record());
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.contains("MESSAGE=NEW TCP connection from 10.0.0.1:1000 to 1.1.1.1:80\n"));
        assert!(text.contains("PRIORITY=6\n"));
        assert!(text.contains("SYSLOG_IDENTIFIER=conntrackd\n"));
    }

    #[test]
    fn record_fields_are_prefixed_and_uppercased() {
        let encoded = encode_entry(&sample_record());
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.contains("EVENT_TYPE=NEW\n"));
        assert!(text.contains("EVENT_SRC_ADDR=10.0.0.1\n"));
        assert!(text.contains("EVENT_DST_PORT=80\n"));
        assert!(text.contains("EVENT_FLOW=5\n"));
    }

    #[test]
    fn multiline_value_uses_binary_framing() {
        let mut record = sample_record();
        record.fields.push(("note".to_owned(), "a\nb".to_owned()));
        let encoded = encode_entry(&record);

        // "EVENT_NOTE\n" + LE u64 길이(3) + "a\nb" + "\n"
        let marker = b"EVENT_NOTE\n";
        let pos = encoded
            .windows(marker.len())
            .position(|w| w == marker)
            .expect("framed field missing");
        let after = &encoded[pos + marker.len()..];
        assert_eq!(&after[..8], &3u64.to_le_bytes());
        assert_eq!(&after[8..11], b"a\nb");
        assert_eq!(after[11], b'\n');
    }

    #[test]
    fn sanitize_key_normalizes() {
        assert_eq!(sanitize_key("src_addr"), "SRC_ADDR");
        assert_eq!(sanitize_key("dst-lat"), "DST_LAT");
        assert_eq!(sanitize_key("flow"), "FLOW");
    }

    #[tokio::test]
    async fn connect_to_missing_socket_fails() {
        let err = match JournalSink::with_socket_path("/nonexistent/journal.socket") {
            Err(err) => err,
            Ok(_) => panic!("expected connection to fail"),
        };
        assert!(matches!(err, SinkError::Init { name: "journal", .. }));
    }

    #[tokio::test]
    async fn emit_to_bound_datagram_socket() {
        // 임시 경로에 수신 소켓을 만들어 전체 emit 경로를 검증
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.socket");
        let receiver = UnixDatagram::bind(&path).unwrap();

        let sink = JournalSink::with_socket_path(path.to_str().unwrap()).unwrap();
        Sink::emit(&sink, &sample_record()).await.unwrap();

        let mut buf = vec![0u8; 4096];
        let n = receiver.recv(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        assert!(text.contains("MESSAGE="));
        assert!(text.contains("EVENT_PROT=TCP"));
    }
}
