//! syslog 싱크
//!
//! RFC 3164 프레임을 udp/tcp/unix 소켓으로 전송합니다. 스킴별
//! 다이얼 대상은 설정 레이어([`SyslogConfig::endpoint`])가
//! 결정합니다.
//!
//! [`SyslogConfig::endpoint`]: conntrackd_core::config::SyslogConfig::endpoint

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket, UnixDatagram};
use tokio::sync::Mutex;

use conntrackd_core::config::SyslogEndpoint;
use conntrackd_core::error::SinkError;
use conntrackd_core::record::Record;
use conntrackd_core::sink::Sink;

/// PRI = facility(daemon=3) * 8 + severity(info=6)
const PRI_DAEMON_INFO: u8 = 30;

/// 전송 계층
enum Transport {
    /// 연결된 UDP 소켓, 프레임당 datagram 하나
    Udp(UdpSocket),
    /// TCP 스트림, 개행 프레이밍 (쓰기 직렬화를 위한 Mutex)
    Tcp(Mutex<TcpStream>),
    /// 연결된 unix datagram 소켓
    Unix(UnixDatagram),
}

/// syslog 싱크
pub struct SyslogSink {
    transport: Transport,
    hostname: String,
}

impl SyslogSink {
    /// 엔드포인트에 다이얼하여 싱크를 생성합니다.
    pub async fn connect(endpoint: &SyslogEndpoint) -> Result<Self, SinkError> {
        let init_err = |reason: String| SinkError::Init {
            name: "syslog",
            reason,
        };

        let transport = match endpoint {
            SyslogEndpoint::Udp(target) => {
                let socket = UdpSocket::bind("0.0.0.0:0")
                    .await
                    .map_err(|e| init_err(e.to_string()))?;
                socket
                    .connect(target)
                    .await
                    .map_err(|e| init_err(format!("connect {target}: {e}")))?;
                Transport::Udp(socket)
            }
            SyslogEndpoint::Tcp(target) => {
                let stream = TcpStream::connect(target)
                    .await
                    .map_err(|e| init_err(format!("connect {target}: {e}")))?;
                Transport::Tcp(Mutex::new(stream))
            }
            SyslogEndpoint::Unix(path) => {
                let socket = UnixDatagram::unbound().map_err(|e| init_err(e.to_string()))?;
                socket
                    .connect(path)
                    .map_err(|e| init_err(format!("connect {}: {e}", path.display())))?;
                Transport::Unix(socket)
            }
        };

        Ok(Self {
            transport,
            hostname: hostname(),
        })
    }
}

impl Sink for SyslogSink {
    fn name(&self) -> &'static str {
        "syslog"
    }

    async fn emit(&self, record: &Record) -> Result<(), SinkError> {
        let frame = format_frame(record, &self.hostname, chrono::Local::now());
        let emit_err = |reason: String| SinkError::Emit {
            name: "syslog",
            reason,
        };

        match &self.transport {
            Transport::Udp(socket) => {
                socket
                    .send(frame.as_bytes())
                    .await
                    .map_err(|e| emit_err(e.to_string()))?;
            }
            Transport::Tcp(stream) => {
                let mut stream = stream.lock().await;
                stream
                    .write_all(frame.as_bytes())
                    .await
                    .map_err(|e| emit_err(e.to_string()))?;
                stream
                    .write_all(b"\n")
                    .await
                    .map_err(|e| emit_err(e.to_string()))?;
            }
            Transport::Unix(socket) => {
                socket
                    .send(frame.as_bytes())
                    .await
                    .map_err(|e| emit_err(e.to_string()))?;
            }
        }

        Ok(())
    }
}

/// RFC 3164 프레임을 생성합니다.
///
/// `<PRI>MMM dd HH:MM:SS HOST conntrackd[pid]: 메시지 key=value ...`
fn format_frame(
    record: &Record,
    hostname: &str,
    now: chrono::DateTime<chrono::Local>,
) -> String {
    use std::fmt::Write;

    let mut frame = format!(
        "<{PRI_DAEMON_INFO}>{} {} conntrackd[{}]: {}",
        now.format("%b %e %H:%M:%S"),
        hostname,
        std::process::id(),
        record.message,
    );

    for (key, value) in &record.fields {
        let _ = write!(frame, " {key}={value}");
    }

    frame
}

/// 시스템 호스트명을 조회합니다. 실패 시 "unknown"을 사용합니다.
pub(crate) fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_owned())
}
