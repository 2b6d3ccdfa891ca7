//! Grafana Loki 싱크
//!
//! 초기화 시 `/ready` 엔드포인트로 가용성을 확인하고, 레코드를
//! `/loki/api/v1/push`로 푸시합니다. 외부 레이블에는 항상
//! `service_name=conntrackd`와 `host=<호스트명>`이 포함되며,
//! 허용 목록의 레코드 속성이 레이블로 승격됩니다.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use conntrackd_core::config::LokiConfig;
use conntrackd_core::error::SinkError;
use conntrackd_core::record::Record;
use conntrackd_core::sink::Sink;

use crate::syslog::hostname;

/// 가용성 확인 경로
const READY_PATH: &str = "/ready";

/// 푸시 경로 (Loki v1 API)
const PUSH_PATH: &str = "/loki/api/v1/push";

/// 레코드 속성 중 레이블로 승격되는 키의 허용 목록
///
/// 키 추가는 코드 변경이며 설정으로 확장되지 않습니다. 카디널리티가
/// 제한된 키만 포함합니다.
const LABEL_KEYS: &[&str] = &[
    "flow", "type", "prot", "src_addr", "src_port", "dst_addr", "dst_port", "tcp_state",
];

/// Grafana Loki 싱크
pub struct LokiSink {
    client: reqwest::Client,
    push_url: String,
    external_labels: Vec<(String, String)>,
}

impl LokiSink {
    /// 설정으로 싱크를 생성하고 가용성을 확인합니다.
    ///
    /// `GET <address>/ready`가 200이 아니면 초기화가 실패합니다.
    pub async fn connect(config: &LokiConfig) -> Result<Self, SinkError> {
        let init_err = |reason: String| SinkError::Init {
            name: "loki",
            reason,
        };

        let base = config
            .base_url()
            .map_err(|e| init_err(e.to_string()))?
            .to_string();
        let base = base.trim_end_matches('/').to_owned();

        let client = reqwest::Client::new();

        let ready_url = format!("{base}{READY_PATH}");
        let response = client
            .get(&ready_url)
            .send()
            .await
            .map_err(|e| init_err(format!("ready check {ready_url}: {e}")))?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(init_err(format!(
                "ready check {ready_url}: {}",
                response.status()
            )));
        }

        Ok(Self {
            client,
            push_url: format!("{base}{PUSH_PATH}"),
            external_labels: external_labels(&config.labels),
        })
    }
}

impl Sink for LokiSink {
    fn name(&self) -> &'static str {
        "loki"
    }

    async fn emit(&self, record: &Record) -> Result<(), SinkError> {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let payload = build_payload(record, &self.external_labels, timestamp_ns);

        let emit_err = |reason: String| SinkError::Emit {
            name: "loki",
            reason,
        };

        let response = self
            .client
            .post(&self.push_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| emit_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(emit_err(format!("push failed: {}", response.status())));
        }

        Ok(())
    }
}

/// 외부 레이블 집합을 구성합니다.
///
/// 기본 레이블에 사용자 `key=value` 항목을 더합니다. 첫 `=`에서만
/// 분리하며, `=`가 없는 항목은 조용히 무시합니다.
fn external_labels(user_labels: &[String]) -> Vec<(String, String)> {
    let mut labels = vec![
        ("service_name".to_owned(), "conntrackd".to_owned()),
        ("host".to_owned(), hostname()),
    ];

    for label in user_labels {
        let Some((key, value)) = label.split_once('=') else {
            continue;
        };
        labels.push((key.to_owned(), value.to_owned()));
    }

    labels
}

/// 푸시 페이로드 하나를 생성합니다.
///
/// 스트림 레이블 = 외부 레이블 + 허용 목록 속성. 로그 라인은
/// 메시지와 승격되지 않은 속성의 JSON입니다.
fn build_payload(
    record: &Record,
    external_labels: &[(String, String)],
    timestamp_ns: u128,
) -> Value {
    let mut labels = serde_json::Map::new();
    for (key, value) in external_labels {
        labels.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in &record.fields {
        if LABEL_KEYS.contains(&key.as_str()) {
            labels.insert(key.clone(), Value::String(value.clone()));
        }
    }

    let mut line = serde_json::Map::new();
    line.insert("message".to_owned(), Value::String(record.message.clone()));
    for (key, value) in &record.fields {
        if !LABEL_KEYS.contains(&key.as_str()) {
            line.insert(key.clone(), Value::String(value.clone()));
        }
    }

    json!({
        "streams": [{
            "stream": Value::Object(labels),
            "values": [[timestamp_ns.to_string(), Value::Object(line).to_string()]],
        }]
    })
}
