//! 이벤트 필터 -- 차단 전용 모드와 호스트 부분 문자열 필터

use dnstail_core::config::StreamConfig;
use dnstail_core::event::EventKind;

/// 이벤트 필터
///
/// 모든 소스에 같은 필터가 적용됩니다. 생성 후 변경되지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    blocked_only: bool,
    host_filter: Option<HostFilter>,
    verbose: bool,
}

/// 호스트 필터 값
#[derive(Debug, Clone, PartialEq, Eq)]
struct HostFilter {
    /// 입력 그대로의 값 (주소 비교용)
    raw: String,
    /// 소문자로 정규화된 값 (이름 부분 문자열 비교용)
    lowered: String,
}

impl EventFilter {
    /// 새 필터를 생성합니다.
    ///
    /// 빈 문자열이나 공백만 있는 호스트 필터는 "필터 없음"으로 취급합니다.
    pub fn new(blocked_only: bool, host_filter: Option<&str>, verbose: bool) -> Self {
        let host_filter = host_filter
            .filter(|f| !f.trim().is_empty())
            .map(|f| HostFilter {
                raw: f.to_owned(),
                lowered: f.trim().to_lowercase(),
            });
        Self {
            blocked_only,
            host_filter,
            verbose,
        }
    }

    /// 스트림 설정에서 필터를 생성합니다.
    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.blocked_only, Some(&config.filter), config.verbose)
    }

    /// 종류 조건: 차단 전용 모드이면 `Block`만 통과합니다.
    pub fn admits_kind(&self, kind: EventKind) -> bool {
        !self.blocked_only || kind.is_blocked()
    }

    /// 호스트 조건: 해석된 이름에 필터가 부분 문자열로 포함되거나(대소문자 무시)
    /// 주소가 입력된 필터와 정확히 같으면 통과합니다.
    pub fn admits_host(&self, name: &str, address: &str) -> bool {
        match &self.host_filter {
            None => true,
            Some(filter) => {
                name.to_lowercase().contains(filter.lowered.as_str()) || address == filter.raw
            }
        }
    }

    /// 미분류 라인을 노출할지 결정합니다.
    ///
    /// verbose 모드에서만 노출하며, 차단 전용 모드나 호스트 필터가 있으면 억제합니다.
    pub fn admits_unclassified(&self) -> bool {
        self.verbose && !self.blocked_only && self.host_filter.is_none()
    }
}
