//! 외부 협력자 trait -- 원격 세션과 역방향 조회의 확장 포인트
//!
//! 코어는 SSH 세션을 직접 다루지 않습니다. [`Transport`]가 소스마다
//! 라인 스트림을 열어주고, [`ReverseLookup`]이 주소를 이름으로 바꿔줍니다.
//! 테스트에서는 인메모리 구현으로 교체합니다.

use std::future::Future;

use crate::error::{ResolveError, TransportError};

/// 한 소스의 순차 라인 스트림
pub trait LineStream: Send + 'static {
    /// 다음 라인을 읽습니다.
    ///
    /// `Ok(None)`은 스트림 종료(원격이 정상적으로 닫힘)를 의미합니다.
    fn next_line(
        &mut self,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// 세션을 종료합니다. 진행 중인 읽기는 더 이상 라인을 반환하지 않습니다.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// 소스별 세션을 여는 transport
pub trait Transport: Send + Sync + 'static {
    /// 이 transport가 여는 스트림 타입
    type Stream: LineStream;

    /// `source_id`에 대한 세션을 열고 라인 스트림을 반환합니다.
    fn open(
        &self,
        source_id: &str,
    ) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;
}

/// 주소 → 이름 역방향 조회
pub trait ReverseLookup: Send + Sync + 'static {
    /// 주소에 대한 이름을 조회합니다.
    fn reverse_lookup(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<String, ResolveError>> + Send;
}
