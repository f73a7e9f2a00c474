//! 소스별 가변 상태
//!
//! [`SourceState`]는 한 `SourceStream` 태스크가 독점 소유합니다.
//! 소스 간에 공유되지 않으므로 잠금이 필요 없습니다.

use crate::resolver::ResolverCache;

/// 소스별 분류/해석 상태
#[derive(Debug, Default)]
pub struct SourceState {
    /// 마지막으로 본 질의 라인의 주소 (차단 라인 연관에 사용)
    pub last_query_address: Option<String>,
    /// 주소 → 이름 캐시
    pub cache: ResolverCache,
}

impl SourceState {
    /// 빈 상태를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }
}
