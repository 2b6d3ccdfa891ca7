//! 설정 — 타입화된 구성 객체와 검증 규칙
//!
//! CLI/설정 파일 레이어가 해석을 끝낸 값이 이 구조체로 전달됩니다.
//! [`ConntrackdConfig::validate`]가 §검증 계약을 강제합니다:
//! 최소 한 개의 싱크 활성화, 싱크 주소 스킴, 스트림 writer 값,
//! GeoIP 데이터베이스 존재 여부.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// 허용되는 로그 레벨
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// 허용되는 로그 형식
pub const LOG_FORMATS: &[&str] = &["json", "pretty"];

/// 허용되는 스트림 writer
pub const STREAM_WRITERS: &[&str] = &["stdout", "stderr", "discard"];

/// 허용되는 syslog 주소 스킴
pub const SYSLOG_SCHEMES: &[&str] = &["udp", "tcp", "unix", "unixgram", "unixpacket"];

/// conntrackd 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConntrackdConfig {
    /// 필터 규칙 목록 (DSL 문자열, 첫 매칭 우선)
    pub filter_rules: Vec<String>,
    /// GeoIP city 데이터베이스 경로 (없으면 위치 정보 미부착)
    pub geoip_database: Option<PathBuf>,
    /// 로그 레벨
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 싱크 설정
    pub sinks: SinkConfig,
}

impl Default for ConntrackdConfig {
    fn default() -> Self {
        Self {
            filter_rules: Vec::new(),
            geoip_database: None,
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            sinks: SinkConfig::default(),
        }
    }
}

/// 싱크 설정 묶음
///
/// 각 싱크는 독립적인 enable 플래그를 가지며, 버스는 선언 순서
/// (journal, syslog, loki, stream)대로 초기화합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// systemd 저널 싱크
    pub journal: JournalConfig,
    /// syslog 싱크
    pub syslog: SyslogConfig,
    /// Grafana Loki 싱크
    pub loki: LokiConfig,
    /// 스트림 싱크
    pub stream: StreamConfig,
}

impl SinkConfig {
    /// 활성화된 싱크가 하나라도 있는지 확인합니다.
    pub fn any_enabled(&self) -> bool {
        self.journal.enable || self.syslog.enable || self.loki.enable || self.stream.enable
    }
}

/// systemd 저널 싱크 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// 활성화 여부
    pub enable: bool,
}

/// syslog 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// 활성화 여부
    pub enable: bool,
    /// 주소 URL (udp, tcp, unix, unixgram, unixpacket 스킴)
    pub address: String,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enable: false,
            address: "udp://localhost:514".to_owned(),
        }
    }
}

/// syslog 전송 방식과 다이얼 대상
///
/// 네트워크 스킴은 `host:port`, unix 계열 스킴은 소켓 경로를
/// 다이얼합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogEndpoint {
    /// UDP 데이터그램
    Udp(String),
    /// TCP 스트림 (개행 프레이밍)
    Tcp(String),
    /// Unix 도메인 소켓 (datagram)
    Unix(PathBuf),
}

impl SyslogConfig {
    /// 주소 URL을 전송 방식과 다이얼 대상으로 분해합니다.
    pub fn endpoint(&self) -> Result<SyslogEndpoint, ConfigError> {
        let url = Url::parse(&self.address).map_err(|e| ConfigError::InvalidValue {
            field: "sink.syslog.address".to_owned(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "udp" | "tcp" => {
                let host = url.host_str().ok_or_else(|| ConfigError::InvalidValue {
                    field: "sink.syslog.address".to_owned(),
                    reason: format!("missing host in {:?}", self.address),
                })?;
                let port = url.port().unwrap_or(514);
                let target = format!("{host}:{port}");
                if url.scheme() == "udp" {
                    Ok(SyslogEndpoint::Udp(target))
                } else {
                    Ok(SyslogEndpoint::Tcp(target))
                }
            }
            "unix" | "unixgram" | "unixpacket" => {
                let path = url.path();
                if path.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "sink.syslog.address".to_owned(),
                        reason: format!("missing socket path in {:?}", self.address),
                    });
                }
                Ok(SyslogEndpoint::Unix(PathBuf::from(path)))
            }
            other => Err(ConfigError::InvalidValue {
                field: "sink.syslog.address".to_owned(),
                reason: format!(
                    "unsupported scheme {:?}, expected one of: {}",
                    other,
                    SYSLOG_SCHEMES.join(", ")
                ),
            }),
        }
    }
}

/// Grafana Loki 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LokiConfig {
    /// 활성화 여부
    pub enable: bool,
    /// 주소 URL (http, https 스킴)
    pub address: String,
    /// 추가 외부 레이블 (`key=value` 형식, 잘못된 항목은 무시)
    pub labels: Vec<String>,
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            enable: false,
            address: "http://localhost:3100".to_owned(),
            labels: Vec::new(),
        }
    }
}

impl LokiConfig {
    /// 주소 URL을 파싱하고 스킴/호스트를 검증합니다.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.address).map_err(|e| ConfigError::InvalidValue {
            field: "sink.loki.address".to_owned(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidValue {
                field: "sink.loki.address".to_owned(),
                reason: format!("unsupported scheme {:?}, expected http or https", url.scheme()),
            });
        }
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "sink.loki.address".to_owned(),
                reason: format!("missing host in {:?}", self.address),
            });
        }

        Ok(url)
    }
}

/// 스트림 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 활성화 여부
    pub enable: bool,
    /// 출력 대상 (stdout, stderr, discard)
    pub writer: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enable: false,
            writer: "stdout".to_owned(),
        }
    }
}

impl ConntrackdConfig {
    /// 설정의 유효성을 검증합니다.
    ///
    /// 검증 순서는 실패 메시지의 유용성을 따릅니다: 로그 설정,
    /// 싱크 활성화 여부, 싱크별 주소/값, GeoIP 파일 존재.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_level".to_owned(),
                reason: format!(
                    "unknown level {:?}, expected one of: {}",
                    self.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_format".to_owned(),
                reason: format!(
                    "unknown format {:?}, expected one of: {}",
                    self.log_format,
                    LOG_FORMATS.join(", ")
                ),
            });
        }

        if !self.sinks.any_enabled() {
            return Err(ConfigError::NoSinkEnabled);
        }

        if self.sinks.syslog.enable {
            self.sinks.syslog.endpoint()?;
        }

        if self.sinks.loki.enable {
            self.sinks.loki.base_url()?;
        }

        if self.sinks.stream.enable
            && !STREAM_WRITERS.contains(&self.sinks.stream.writer.as_str())
        {
            return Err(ConfigError::InvalidValue {
                field: "sink.stream.writer".to_owned(),
                reason: format!(
                    "invalid stream writer {:?}, expected one of: {}",
                    self.sinks.stream.writer,
                    STREAM_WRITERS.join(", ")
                ),
            });
        }

        if let Some(ref path) = self.geoip_database {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        }

        Ok(())
    }
}
