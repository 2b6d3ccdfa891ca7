//! 싱크 버스 — 초기화와 팬아웃
//!
//! 활성화된 싱크를 선언 순서(journal, syslog, loki, stream)대로
//! 초기화합니다. 개별 싱크의 초기화 실패는 stderr 경고 후 계속
//! 진행하되, `CONNTRACKD_SINK_EXIT_ON_WARNING`이 설정되어 있으면
//! 종료 코드 1로 프로세스를 종료합니다. 초기화에 성공한 싱크가
//! 하나도 없으면 버스 생성이 실패합니다.

use conntrackd_core::config::SinkConfig;
use conntrackd_core::error::SinkError;
use conntrackd_core::record::Record;
use conntrackd_core::sink::DynSink;

use crate::journal::JournalSink;
use crate::loki::LokiSink;
use crate::stream::StreamSink;
use crate::syslog::SyslogSink;

/// 싱크 초기화 경고를 치명적으로 승격하는 환경 변수
pub const EXIT_ON_WARNING_ENV: &str = "CONNTRACKD_SINK_EXIT_ON_WARNING";

/// 초기화된 싱크들의 팬아웃 버스
pub struct SinkBus {
    sinks: Vec<Box<dyn DynSink>>,
}

impl SinkBus {
    /// 설정에 따라 활성화된 싱크를 초기화합니다.
    pub async fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let exit_on_warning = std::env::var(EXIT_ON_WARNING_ENV)
            .map(|v| v == "1" || v == "true")
            .unwrap_or(false);

        let mut sinks: Vec<Box<dyn DynSink>> = Vec::new();
        let mut register = |name: &str, result: Result<Box<dyn DynSink>, SinkError>| {
            match result {
                Ok(sink) => sinks.push(sink),
                Err(err) => {
                    eprintln!("Warning: Failed to initialize sink {name:?}: {err}");
                    if exit_on_warning {
                        std::process::exit(1);
                    }
                }
            }
        };

        if config.journal.enable {
            register("journal", JournalSink::new().map(|s| Box::new(s) as Box<dyn DynSink>));
        }

        if config.syslog.enable {
            let result = match config.syslog.endpoint() {
                Ok(endpoint) => SyslogSink::connect(&endpoint)
                    .await
                    .map(|s| Box::new(s) as Box<dyn DynSink>),
                Err(err) => Err(SinkError::Init {
                    name: "syslog",
                    reason: err.to_string(),
                }),
            };
            register("syslog", result);
        }

        if config.loki.enable {
            register(
                "loki",
                LokiSink::connect(&config.loki).await.map(|s| Box::new(s) as Box<dyn DynSink>),
            );
        }

        if config.stream.enable {
            register(
                "stream",
                StreamSink::new(&config.stream.writer).map(|s| Box::new(s) as Box<dyn DynSink>),
            );
        }

        if sinks.is_empty() {
            return Err(SinkError::NoTargetSinkAvailable);
        }

        Ok(Self { sinks })
    }

    /// 테스트와 내부 조립용: 이미 생성된 싱크 목록으로 버스를 만듭니다.
    pub fn from_sinks(sinks: Vec<Box<dyn DynSink>>) -> Result<Self, SinkError> {
        if sinks.is_empty() {
            return Err(SinkError::NoTargetSinkAvailable);
        }
        Ok(Self { sinks })
    }

    /// 레코드를 모든 싱크로 발행합니다.
    ///
    /// 싱크 하나의 실패는 흡수되어 다른 싱크와 호출자에 영향을 주지
    /// 않습니다.
    pub async fn emit(&self, record: &Record) {
        for sink in &self.sinks {
            if let Err(err) = sink.emit(record).await {
                tracing::debug!(sink = sink.name(), error = %err, "sink emit failed");
            }
        }
    }

    /// 초기화된 싱크 이름 목록
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// 초기화된 싱크 수
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// 초기화된 싱크가 없는지 확인 (생성 규칙상 항상 false)
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for SinkBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkBus")
            .field("sinks", &self.sink_names())
            .finish()
    }
}
