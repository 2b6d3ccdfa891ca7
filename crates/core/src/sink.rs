//! 싱크 trait — 레코드 발행 지점 정의
//!
//! [`Sink`] trait은 각 싱크 구현체가 제공하는 발행 인터페이스입니다.
//! [`DynSink`]는 `Vec<Box<dyn DynSink>>`로 이기종 싱크를 한 버스에
//! 담을 수 있게 하는 dyn-compatible 미러입니다.

use std::future::Future;
use std::pin::Pin;

use crate::error::SinkError;
use crate::record::Record;

/// dyn-compatible Future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 레코드 발행 싱크 trait
///
/// 구현체는 동시 호출에 안전해야 합니다. 파이프라인 워커들이
/// 공유 참조로 동시에 `emit`을 호출합니다.
///
/// # 구현 예시
/// ```ignore
/// struct StreamSink { /* ... */ }
///
/// impl Sink for StreamSink {
///     fn name(&self) -> &'static str { "stream" }
///
///     async fn emit(&self, record: &Record) -> Result<(), SinkError> {
///         // 레코드 직렬화 및 쓰기
///         Ok(())
///     }
/// }
/// ```
pub trait Sink: Send + Sync {
    /// 싱크 이름 (경고 메시지와 로그에 사용)
    fn name(&self) -> &'static str;

    /// 레코드 하나를 발행합니다.
    ///
    /// 실패는 호출자에게 전파되지만, 버스는 이를 흡수하고 다른
    /// 싱크로의 발행을 계속합니다.
    fn emit(&self, record: &Record) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// dyn-compatible 싱크 trait
///
/// `Sink` trait은 RPITIT를 사용하므로 `dyn Sink`가 불가합니다.
/// `DynSink`는 `BoxFuture`를 반환하여 버스가 싱크 목록을 동적으로
/// 관리할 수 있게 합니다. `Sink` 구현 타입은 blanket impl로 자동으로
/// `DynSink`도 구현됩니다.
pub trait DynSink: Send + Sync {
    /// 싱크 이름
    fn name(&self) -> &'static str;

    /// 레코드 하나를 발행합니다.
    fn emit<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, Result<(), SinkError>>;
}

impl<T: Sink> DynSink for T {
    fn name(&self) -> &'static str {
        Sink::name(self)
    }

    fn emit<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(Sink::emit(self, record))
    }
}
