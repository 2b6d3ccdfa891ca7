//! 스트림 싱크
//!
//! 레코드당 JSON 객체 한 줄을 stdout/stderr에 쓰거나 버립니다.

use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

use conntrackd_core::config::STREAM_WRITERS;
use conntrackd_core::error::SinkError;
use conntrackd_core::record::Record;
use conntrackd_core::sink::Sink;

/// 출력 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Writer {
    Stdout,
    Stderr,
    Discard,
}

/// 스트림 싱크
pub struct StreamSink {
    writer: Writer,
}

impl StreamSink {
    /// writer 이름으로 싱크를 생성합니다.
    pub fn new(writer: &str) -> Result<Self, SinkError> {
        let writer = match writer {
            "stdout" => Writer::Stdout,
            "stderr" => Writer::Stderr,
            "discard" => Writer::Discard,
            other => {
                return Err(SinkError::Init {
                    name: "stream",
                    reason: format!(
                        "invalid stream writer {other:?}, expected one of: {}",
                        STREAM_WRITERS.join(", ")
                    ),
                });
            }
        };
        Ok(Self { writer })
    }
}

impl Sink for StreamSink {
    fn name(&self) -> &'static str {
        "stream"
    }

    async fn emit(&self, record: &Record) -> Result<(), SinkError> {
        if self.writer == Writer::Discard {
            return Ok(());
        }

        let mut line = serialize_record(record);
        line.push('\n');

        let emit_err = |reason: String| SinkError::Emit {
            name: "stream",
            reason,
        };

        match self.writer {
            Writer::Stdout => {
                let mut stdout = tokio::io::stdout();
                stdout
                    .write_all(line.as_bytes())
                    .await
                    .map_err(|e| emit_err(e.to_string()))?;
                stdout.flush().await.map_err(|e| emit_err(e.to_string()))?;
            }
            Writer::Stderr => {
                let mut stderr = tokio::io::stderr();
                stderr
                    .write_all(line.as_bytes())
                    .await
                    .map_err(|e| emit_err(e.to_string()))?;
                stderr.flush().await.map_err(|e| emit_err(e.to_string()))?;
            }
            Writer::Discard => unreachable!(),
        }

        Ok(())
    }
}

/// 레코드를 JSON 객체 문자열로 직렬화합니다.
fn serialize_record(record: &Record) -> String {
    let mut object = Map::new();
    object.insert(
        "time".to_owned(),
        Value::String(chrono::Local::now().to_rfc3339()),
    );
    object.insert("level".to_owned(), Value::String("INFO".to_owned()));
    object.insert("msg".to_owned(), Value::String(record.message.clone()));
    for (key, value) in &record.fields {
        object.insert(key.clone(), Value::String(value.clone()));
    }
    Value::Object(object).to_string()
}
