//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않은 경우 매크로 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `dnstail_`
//! - 영역: `stream_`, `resolver_`, `transport_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 소스 레이블 키 (예: pihole1)
pub const LABEL_SOURCE: &str = "source";

/// 이벤트 종류 레이블 키 (query, block, unclassified)
pub const LABEL_KIND: &str = "kind";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Stream 메트릭 ─────────────────────────────────────────────────

/// Stream: 읽은 원시 라인 수 (counter, label: source)
pub const STREAM_LINES_READ_TOTAL: &str = "dnstail_stream_lines_read_total";

/// Stream: 병합 채널로 방출된 이벤트 수 (counter, label: source, kind)
pub const STREAM_EVENTS_EMITTED_TOTAL: &str = "dnstail_stream_events_emitted_total";

/// Stream: 필터로 제외된 이벤트 수 (counter, label: source)
pub const STREAM_EVENTS_FILTERED_TOTAL: &str = "dnstail_stream_events_filtered_total";

/// Stream: 미분류 라인 수 (counter, label: source)
pub const STREAM_UNCLASSIFIED_LINES_TOTAL: &str = "dnstail_stream_unclassified_lines_total";

/// Stream: 선행 질의 없이 도착한 차단 라인 수 (counter, label: source)
pub const STREAM_ORPHAN_BLOCKS_TOTAL: &str = "dnstail_stream_orphan_blocks_total";

/// Stream: 실행 중인 소스 수 (gauge)
pub const STREAM_ACTIVE_SOURCES: &str = "dnstail_stream_active_sources";

// ─── Resolver 메트릭 ───────────────────────────────────────────────

/// Resolver: 외부 역방향 조회 수 (counter, label: result)
pub const RESOLVER_LOOKUPS_TOTAL: &str = "dnstail_resolver_lookups_total";

/// Resolver: 캐시 적중 수 (counter)
pub const RESOLVER_CACHE_HITS_TOTAL: &str = "dnstail_resolver_cache_hits_total";

// ─── Transport 메트릭 ──────────────────────────────────────────────

/// Transport: 세션 에러 수 (counter, label: source)
pub const TRANSPORT_ERRORS_TOTAL: &str = "dnstail_transport_errors_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// `metrics::describe_counter!()`, `describe_gauge!()`을
/// 호출하여 Prometheus HELP 라인에 표시될 설명을 등록합니다.
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        STREAM_LINES_READ_TOTAL,
        "Total raw log lines read from remote sessions"
    );
    describe_counter!(
        STREAM_EVENTS_EMITTED_TOTAL,
        "Total formatted events pushed onto the merge channel"
    );
    describe_counter!(
        STREAM_EVENTS_FILTERED_TOTAL,
        "Total classified events dropped by the host or blocked-only filter"
    );
    describe_counter!(
        STREAM_UNCLASSIFIED_LINES_TOTAL,
        "Total lines matching neither the query nor the block pattern"
    );
    describe_counter!(
        STREAM_ORPHAN_BLOCKS_TOTAL,
        "Total block lines seen before any query on the same source"
    );
    describe_gauge!(STREAM_ACTIVE_SOURCES, "Number of source streams currently running");
    describe_counter!(
        RESOLVER_LOOKUPS_TOTAL,
        "Total external reverse lookups performed"
    );
    describe_counter!(
        RESOLVER_CACHE_HITS_TOTAL,
        "Total address resolutions served from the per-source cache"
    );
    describe_counter!(
        TRANSPORT_ERRORS_TOTAL,
        "Total fatal remote session errors"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        STREAM_LINES_READ_TOTAL,
        STREAM_EVENTS_EMITTED_TOTAL,
        STREAM_EVENTS_FILTERED_TOTAL,
        STREAM_UNCLASSIFIED_LINES_TOTAL,
        STREAM_ORPHAN_BLOCKS_TOTAL,
        STREAM_ACTIVE_SOURCES,
        RESOLVER_LOOKUPS_TOTAL,
        RESOLVER_CACHE_HITS_TOTAL,
        TRANSPORT_ERRORS_TOTAL,
    ];

    #[test]
    fn all_metrics_start_with_dnstail_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("dnstail_"),
                "Metric '{}' does not start with 'dnstail_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES
            .iter()
            .filter(|n| **n != STREAM_ACTIVE_SOURCES)
        {
            assert!(name.ends_with("_total"), "counter '{}' lacks _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 없어도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_SOURCE, LABEL_KIND, LABEL_RESULT] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
