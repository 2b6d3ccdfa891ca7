//! 수집 파이프라인 — 리스너/프로세서 태스크와 생명주기
//!
//! 리스너 태스크는 넷링크 datagram을 디코딩해 용량 제한 채널에
//! 넣고, 프로세서 태스크는 이벤트를 소비합니다. 느린 싱크는 채널
//! 역압(backpressure)으로 이어지며, 이것이 무제한 증가를 막는 정책
//! 입니다.
//!
//! 종료는 두 경로로 시작됩니다:
//! - 취소 토큰(시그널): 리스너가 수신을 멈추고 채널을 닫으면
//!   프로세서가 잔여 이벤트를 드레인한 뒤 종료 — `run`은 `true`
//! - 리스너의 치명적 소켓 에러: 에러 채널로 보고되고 동일한 드레인
//!   절차를 거쳐 종료 — `run`은 `false`

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use conntrackd_core::event::FlowEvent;
use conntrackd_core::record::Record;
use conntrackd_filter::Filter;
use conntrackd_geoip::GeoReader;
use conntrackd_sink::SinkBus;

use crate::decode::decode_datagram;
use crate::error::ConntrackError;
use crate::socket::ConntrackSocket;

/// 리스너와 프로세서 사이의 이벤트 채널 용량
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 수집 파이프라인
///
/// 필터/GeoIP/버스는 생성 이후 불변이며 태스크 간 `Arc`로 공유됩니다.
pub struct IngestPipeline {
    filter: Arc<Filter>,
    geoip: Option<Arc<GeoReader>>,
    bus: Arc<SinkBus>,
    channel_capacity: usize,
}

/// 파이프라인 빌더
pub struct IngestPipelineBuilder {
    filter: Option<Arc<Filter>>,
    geoip: Option<Arc<GeoReader>>,
    bus: Option<Arc<SinkBus>>,
    channel_capacity: usize,
}

impl IngestPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            filter: None,
            geoip: None,
            bus: None,
            channel_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }

    /// 컴파일된 필터를 지정합니다. 지정하지 않으면 빈 필터
    /// (모든 이벤트 기본 기록)가 사용됩니다.
    pub fn filter(mut self, filter: Arc<Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// GeoIP 리더를 지정합니다.
    pub fn geoip(mut self, geoip: Arc<GeoReader>) -> Self {
        self.geoip = Some(geoip);
        self
    }

    /// 싱크 버스를 지정합니다 (필수).
    pub fn bus(mut self, bus: Arc<SinkBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// 이벤트 채널 용량을 변경합니다 (테스트용).
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// 파이프라인을 조립합니다.
    pub fn build(self) -> Result<IngestPipeline, ConntrackError> {
        let bus = self
            .bus
            .ok_or_else(|| ConntrackError::Init("sink bus is required".to_owned()))?;

        Ok(IngestPipeline {
            filter: self.filter.unwrap_or_default(),
            geoip: self.geoip,
            bus,
            channel_capacity: self.channel_capacity,
        })
    }
}

impl Default for IngestPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestPipeline {
    /// 소켓을 열고 취소될 때까지 이벤트를 처리합니다.
    ///
    /// 소켓 열기 실패만 에러로 반환됩니다. 반환값은 정상 종료
    /// 여부입니다: 취소로 멈추면 `true`, 리스너 에러로 멈추면
    /// `false`.
    pub async fn run(&self, cancel: CancellationToken) -> Result<bool, ConntrackError> {
        let socket = ConntrackSocket::open()?;
        tracing::info!(
            rules = self.filter.len(),
            geoip = self.geoip.is_some(),
            "conntrack listener started"
        );

        let (event_tx, event_rx) = mpsc::channel(self.channel_capacity);
        let (error_tx, mut error_rx) = mpsc::channel(1);

        let listener = tokio::spawn(listen(socket, event_tx, error_tx, cancel.clone()));
        let processor = tokio::spawn(process_events(
            event_rx,
            Arc::clone(&self.filter),
            self.geoip.clone(),
            Arc::clone(&self.bus),
        ));

        let clean = supervise(&cancel, &mut error_rx).await;
        if !clean {
            // 리스너 에러: 나머지 태스크에도 종료를 전파
            cancel.cancel();
        }

        // 리스너 종료로 채널이 닫히면 프로세서는 잔여 이벤트를
        // 드레인한 뒤 반환한다
        let _ = listener.await;
        let _ = processor.await;

        tracing::info!(clean = clean, "conntrack listener stopped");
        Ok(clean)
    }
}

/// 종료 원인을 기다립니다. 취소면 `true`, 리스너 에러면 `false`.
async fn supervise(
    cancel: &CancellationToken,
    error_rx: &mut mpsc::Receiver<ConntrackError>,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        err = error_rx.recv() => match err {
            Some(err) => {
                tracing::error!(error = %err, "conntrack listener failed");
                false
            }
            // 에러 없이 송신측이 닫힘: 취소 경로와 동일하게 취급
            None => true,
        },
    }
}

/// 리스너 태스크: 소켓 수신과 디코딩
async fn listen(
    mut socket: ConntrackSocket,
    event_tx: mpsc::Sender<FlowEvent>,
    error_tx: mpsc::Sender<ConntrackError>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("conntrack listener cancelled");
                return;
            }
            result = socket.recv() => match result {
                Ok(datagram) => {
                    let events = match decode_datagram(datagram) {
                        Ok(events) => events,
                        Err(err) => {
                            // 잘못된 datagram 하나가 스트림을 멈추지 않음
                            tracing::debug!(error = %err, "dropping undecodable datagram");
                            continue;
                        }
                    };
                    for event in events {
                        if event_tx.send(event).await.is_err() {
                            // 프로세서가 사라짐
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = error_tx.send(err).await;
                    return;
                }
            },
        }
    }
}

/// 프로세서 태스크: 필터 평가, GeoIP 부착, 싱크 발행
///
/// 채널이 닫히면 잔여 이벤트까지 처리하고 반환합니다. 이 함수는
/// 이벤트 소스에 무관하므로 통합 테스트가 커널 없이 채널로 이벤트를
/// 주입할 수 있습니다.
pub async fn process_events(
    mut event_rx: mpsc::Receiver<FlowEvent>,
    filter: Arc<Filter>,
    geoip: Option<Arc<GeoReader>>,
    bus: Arc<SinkBus>,
) {
    while let Some(event) = event_rx.recv().await {
        // TCP/UDP 외 프로토콜은 필터 이전에 조용히 버림
        if !event.is_tcp() && !event.is_udp() {
            continue;
        }

        let verdict = filter.evaluate(&event);
        if !verdict.should_log {
            tracing::trace!(
                flow = event.flow_id,
                rule = verdict.rule_index.map(|i| i as i64).unwrap_or(-1),
                "event dropped by filter"
            );
            continue;
        }

        let (src_location, dst_location) = match geoip {
            Some(ref reader) => (reader.lookup(event.src_addr), reader.lookup(event.dst_addr)),
            None => (None, None),
        };

        let record = Record::from_event(&event, src_location.as_ref(), dst_location.as_ref());
        bus.emit(&record).await;
    }

    tracing::debug!("event channel closed, processor drained");
}
