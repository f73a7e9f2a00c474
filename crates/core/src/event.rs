//! 이벤트 타입 -- 분류기 출력과 병합 채널을 흐르는 표시용 이벤트
//!
//! [`ParsedEvent`]는 한 줄의 원시 로그를 분류한 결과이고,
//! [`FormattedEvent`]는 주소 해석과 포맷팅을 거쳐 병합 채널로 전달되는 최종 형태입니다.
//! `FormattedEvent`는 한 번 생성되면 변경되지 않으며 `MergeSink`가 정확히 한 번 소비합니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 이벤트 종류
///
/// 표시 스타일(차단/일반)을 결정하는 태그로도 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// DNS 질의
    Query,
    /// 차단/거부된 질의
    Block,
    /// 어느 패턴에도 해당하지 않는 라인 (verbose 모드 전용)
    Unclassified,
}

impl EventKind {
    /// 차단 스타일로 표시해야 하는지 여부
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::Block)
    }

    /// 메트릭 레이블 등에 쓰이는 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Block => "block",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 분류된 로그 라인
///
/// `Block`의 주소는 같은 소스에서 가장 최근에 본 `Query`의 주소를 빌려온 것입니다.
/// 한 번 할당된 주소는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// 질의 라인
    Query { description: String, address: String },
    /// 차단/거부 라인
    Block { description: String, address: String },
    /// 미분류 라인
    Unclassified { raw: String },
}

impl ParsedEvent {
    /// 이벤트 종류를 반환합니다.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Query { .. } => EventKind::Query,
            Self::Block { .. } => EventKind::Block,
            Self::Unclassified { .. } => EventKind::Unclassified,
        }
    }

    /// 질의한 장치의 주소 (미분류 라인은 `None`)
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Query { address, .. } | Self::Block { address, .. } => Some(address),
            Self::Unclassified { .. } => None,
        }
    }

    /// 표시할 본문
    pub fn description(&self) -> &str {
        match self {
            Self::Query { description, .. } | Self::Block { description, .. } => description,
            Self::Unclassified { raw } => raw,
        }
    }
}

/// 표시 준비가 끝난 이벤트
///
/// `line`은 텍스트 출력용으로 미리 렌더링된 한 줄이며,
/// 나머지 필드는 JSON 출력과 테스트에서 사용됩니다.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedEvent {
    /// 캡처 시각 (원격 로그의 타임스탬프가 아니라 방출 시점)
    #[serde(skip)]
    pub captured_at: SystemTime,
    /// 표시용 시각 (`HH:MM:SS`)
    pub timestamp: String,
    /// 소스 식별자
    pub source: String,
    /// 해석된 호스트 레이블 (`name (address)` 또는 주소)
    pub host: Option<String>,
    /// 원시 주소
    pub address: Option<String>,
    /// 원본 본문
    pub description: String,
    /// 이벤트 종류
    pub kind: EventKind,
    /// 렌더링된 텍스트 라인
    #[serde(skip)]
    pub line: String,
}

impl FormattedEvent {
    /// 차단 이벤트인지 여부
    pub fn is_blocked(&self) -> bool {
        self.kind.is_blocked()
    }
}

impl fmt::Display for FormattedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}
