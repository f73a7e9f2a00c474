//! 소스 스트림 -- 원격 세션 하나의 라인을 분류/해석/필터링하여 병합 채널로 방출
//!
//! 라인 단위 처리 흐름:
//! ```text
//! next_line -> trim/skip empty -> classify -> kind filter -> resolve -> host filter -> format -> send
//! ```
//!
//! [`SourceState`]는 이 스트림이 독점 소유합니다. 같은 소스 안에서는 라인을 읽은 순서대로
//! 이벤트가 채널에 들어갑니다.

use std::sync::Arc;

use dnstail_core::event::{FormattedEvent, ParsedEvent};
use dnstail_core::metrics as m;
use dnstail_core::pipeline::{LineStream, ReverseLookup};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::classifier::LineClassifier;
use crate::error::LogStreamError;
use crate::filter::EventFilter;
use crate::format::EventFormatter;
use crate::resolver::resolve;
use crate::state::SourceState;

/// 스트림 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// 원격이 스트림을 정상적으로 닫음
    EndOfStream,
    /// 취소 신호를 받음
    Cancelled,
    /// 병합 싱크가 더 이상 이벤트를 받지 않음
    SinkClosed,
}

/// 소스별 처리 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// 읽은 원시 라인 수
    pub lines_read: u64,
    /// 채널로 방출한 이벤트 수
    pub events_emitted: u64,
    /// 필터로 제외된 이벤트 수
    pub events_filtered: u64,
    /// 미분류 라인 수
    pub unclassified: u64,
    /// 선행 질의 없는 차단 라인 수
    pub orphan_blocks: u64,
}

/// 소스 스트림 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    /// 소스 식별자
    pub source_id: String,
    /// 종료 사유
    pub end: StreamEnd,
    /// 처리 통계
    pub stats: SourceStats,
}

/// 한 줄 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// 이벤트를 방출함
    Emitted,
    /// 빈 줄, 필터, 미분류 등으로 버려짐
    Dropped,
    /// 채널 수신측이 닫힘
    SinkClosed,
}

/// 원격 세션 하나를 구동하는 소스 스트림
pub struct SourceStream<S, L>
where
    S: LineStream,
    L: ReverseLookup,
{
    stream: S,
    lookup: Arc<L>,
    classifier: Arc<LineClassifier>,
    filter: EventFilter,
    formatter: EventFormatter,
    state: SourceState,
    tx: mpsc::Sender<FormattedEvent>,
    stats: SourceStats,
}

impl<S, L> SourceStream<S, L>
where
    S: LineStream,
    L: ReverseLookup,
{
    /// 새 소스 스트림을 생성합니다. 소스 식별자는 포맷터에서 가져옵니다.
    pub fn new(
        stream: S,
        lookup: Arc<L>,
        classifier: Arc<LineClassifier>,
        filter: EventFilter,
        formatter: EventFormatter,
        tx: mpsc::Sender<FormattedEvent>,
    ) -> Self {
        Self {
            stream,
            lookup,
            classifier,
            filter,
            formatter,
            state: SourceState::new(),
            tx,
            stats: SourceStats::default(),
        }
    }

    /// 소스 식별자
    pub fn source_id(&self) -> &str {
        self.formatter.source_id()
    }

    /// 현재까지의 통계
    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    /// 스트림이 끝나거나 취소될 때까지 라인을 처리합니다.
    ///
    /// 종료 시 항상 세션을 닫습니다. 읽기 실패는 재시도하지 않고 에러로 반환합니다.
    /// 취소 시 처리 중이던 라인은 버려집니다.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<SourceSummary, LogStreamError> {
        let source_id = self.source_id().to_owned();
        info!(source = %source_id, "source stream started");

        let result = self.read_loop(&cancel).await;

        if let Err(e) = self.stream.close().await {
            warn!(source = %source_id, error = %e, "failed to close session");
        }

        match result {
            Ok(end) => {
                info!(
                    source = %source_id,
                    end = ?end,
                    lines = self.stats.lines_read,
                    events = self.stats.events_emitted,
                    "source stream stopped"
                );
                Ok(SourceSummary {
                    source_id,
                    end,
                    stats: self.stats,
                })
            }
            Err(e) => {
                metrics::counter!(m::TRANSPORT_ERRORS_TOTAL, m::LABEL_SOURCE => source_id.clone())
                    .increment(1);
                warn!(source = %source_id, error = %e, "source stream failed");
                Err(e.into())
            }
        }
    }

    async fn read_loop(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<StreamEnd, dnstail_core::error::TransportError> {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
                next = self.stream.next_line() => next?,
            };

            let Some(line) = next else {
                return Ok(StreamEnd::EndOfStream);
            };

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
                outcome = self.process_line(&line) => outcome,
            };

            if outcome == LineOutcome::SinkClosed {
                debug!(source = %self.source_id(), "merge channel closed, stopping");
                return Ok(StreamEnd::SinkClosed);
            }
        }
    }

    /// 원시 라인 하나를 처리합니다.
    pub async fn process_line(&mut self, raw: &str) -> LineOutcome {
        let line = raw.trim();
        if line.is_empty() {
            return LineOutcome::Dropped;
        }

        self.stats.lines_read += 1;
        metrics::counter!(m::STREAM_LINES_READ_TOTAL, m::LABEL_SOURCE => self.source_id().to_owned())
            .increment(1);

        let Some(event) = self.classifier.classify(line, &mut self.state) else {
            return self.handle_unmatched(line).await;
        };

        if !self.filter.admits_kind(event.kind()) {
            return self.drop_filtered();
        }

        // classify가 Some이면 Query 또는 Block이므로 주소가 항상 있음
        let Some(address) = event.address() else {
            return LineOutcome::Dropped;
        };
        let name = resolve(self.lookup.as_ref(), address, &mut self.state.cache).await;

        if !self.filter.admits_host(&name, address) {
            return self.drop_filtered();
        }

        self.emit(&event, Some(&name)).await
    }

    async fn handle_unmatched(&mut self, line: &str) -> LineOutcome {
        if self.classifier.is_block_line(line) {
            self.stats.orphan_blocks += 1;
            metrics::counter!(m::STREAM_ORPHAN_BLOCKS_TOTAL, m::LABEL_SOURCE => self.source_id().to_owned())
                .increment(1);
            trace!(source = %self.source_id(), line, "block line without a preceding query");
        } else {
            self.stats.unclassified += 1;
            metrics::counter!(m::STREAM_UNCLASSIFIED_LINES_TOTAL, m::LABEL_SOURCE => self.source_id().to_owned())
                .increment(1);
        }

        if !self.filter.admits_unclassified() {
            return LineOutcome::Dropped;
        }

        let event = ParsedEvent::Unclassified {
            raw: line.to_owned(),
        };
        self.emit(&event, None).await
    }

    fn drop_filtered(&mut self) -> LineOutcome {
        self.stats.events_filtered += 1;
        metrics::counter!(m::STREAM_EVENTS_FILTERED_TOTAL, m::LABEL_SOURCE => self.source_id().to_owned())
            .increment(1);
        LineOutcome::Dropped
    }

    async fn emit(&mut self, event: &ParsedEvent, name: Option<&str>) -> LineOutcome {
        let formatted = match self.formatter.format(event, name) {
            Ok(formatted) => formatted,
            Err(e) => {
                warn!(source = %self.source_id(), error = %e, "failed to format event");
                return LineOutcome::Dropped;
            }
        };

        if self.tx.send(formatted).await.is_err() {
            return LineOutcome::SinkClosed;
        }

        self.stats.events_emitted += 1;
        metrics::counter!(
            m::STREAM_EVENTS_EMITTED_TOTAL,
            m::LABEL_SOURCE => self.source_id().to_owned(),
            m::LABEL_KIND => event.kind().as_str()
        )
        .increment(1);
        LineOutcome::Emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnstail_core::error::{ResolveError, TransportError};
    use dnstail_core::event::EventKind;
    use std::collections::VecDeque;

    struct VecStream {
        lines: VecDeque<String>,
        closed: bool,
    }

    impl VecStream {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| (*l).to_owned()).collect(),
                closed: false,
            }
        }
    }

    impl LineStream for VecStream {
        async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
            Ok(self.lines.pop_front())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closed = true;
            Ok(())
        }
    }

    struct StaticLookup;

    impl ReverseLookup for StaticLookup {
        async fn reverse_lookup(&self, address: &str) -> Result<String, ResolveError> {
            match address {
                "192.168.1.100" => Ok("laptop.local".to_owned()),
                "192.168.1.50" => Ok("printer.local".to_owned()),
                other => Err(ResolveError::NotFound(other.to_owned())),
            }
        }
    }

    const QUERY: &str = "Oct  4 14:18:46: query[A] example.com from 192.168.1.100";
    const BLOCK: &str = "Oct  4 14:18:47: gravity blocked ads.example.com is 0.0.0.0";

    fn source(
        lines: &[&str],
        filter: EventFilter,
    ) -> (
        SourceStream<VecStream, StaticLookup>,
        mpsc::Receiver<FormattedEvent>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let stream = SourceStream::new(
            VecStream::new(lines),
            Arc::new(StaticLookup),
            Arc::new(LineClassifier::with_defaults().unwrap()),
            filter,
            EventFormatter::new("pihole1", 0).with_color(false),
            tx,
        );
        (stream, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<FormattedEvent>) -> Vec<FormattedEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn query_then_block_end_to_end() {
        let (stream, mut rx) = source(&[QUERY, BLOCK], EventFilter::default());

        let summary = stream.run(CancellationToken::new()).await.unwrap();
        let events = drain(&mut rx);

        assert_eq!(summary.end, StreamEnd::EndOfStream);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Query);
        assert_eq!(events[0].host.as_deref(), Some("laptop.local (192.168.1.100)"));
        assert!(events[0].description.ends_with("query[A] example.com"));
        assert_eq!(events[1].kind, EventKind::Block);
        assert_eq!(events[1].address.as_deref(), Some("192.168.1.100"));
    }

    #[tokio::test]
    async fn blocked_only_emits_single_block() {
        let (stream, mut rx) = source(&[QUERY, BLOCK], EventFilter::new(true, None, false));

        let summary = stream.run(CancellationToken::new()).await.unwrap();
        let events = drain(&mut rx);

        assert_eq!(events.len(), 1);
        assert!(events[0].is_blocked());
        assert_eq!(summary.stats.events_filtered, 1);
    }

    #[tokio::test]
    async fn empty_lines_are_skipped() {
        let (mut stream, mut rx) = source(&[], EventFilter::default());

        assert_eq!(stream.process_line("").await, LineOutcome::Dropped);
        assert_eq!(stream.process_line("   \r").await, LineOutcome::Dropped);
        assert_eq!(stream.stats().lines_read, 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn trailing_carriage_return_is_trimmed() {
        let (mut stream, mut rx) = source(&[], EventFilter::default());

        let outcome = stream.process_line(&format!("{QUERY}\r")).await;

        assert_eq!(outcome, LineOutcome::Emitted);
        assert_eq!(drain(&mut rx)[0].address.as_deref(), Some("192.168.1.100"));
    }

    #[tokio::test]
    async fn host_filter_keeps_matching_name_only() {
        let printer = "Oct  4 14:18:48: query[A] cups.example from 192.168.1.50";
        let (stream, mut rx) = source(
            &[QUERY, printer, BLOCK],
            EventFilter::new(false, Some("printer"), false),
        );

        stream.run(CancellationToken::new()).await.unwrap();
        let events = drain(&mut rx);

        // 차단 라인은 직전 질의(프린터)의 주소를 가져감
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.address.as_deref() == Some("192.168.1.50")));
    }

    #[tokio::test]
    async fn orphan_block_dropped_unless_verbose() {
        let (stream, mut rx) = source(&[BLOCK], EventFilter::default());
        let summary = stream.run(CancellationToken::new()).await.unwrap();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(summary.stats.orphan_blocks, 1);

        let (stream, mut rx) = source(&[BLOCK], EventFilter::new(false, None, true));
        stream.run(CancellationToken::new()).await.unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Unclassified);
    }

    #[tokio::test]
    async fn verbose_surfaces_unclassified_lines() {
        let noise = "Oct  4 14:18:46: forwarded example.com to 1.1.1.1";
        let (stream, mut rx) = source(&[noise], EventFilter::new(false, None, true));

        let summary = stream.run(CancellationToken::new()).await.unwrap();
        let events = drain(&mut rx);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line, format!("[{}] [pihole1] {noise}", events[0].timestamp));
        assert_eq!(summary.stats.unclassified, 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_reads_nothing() {
        let (stream, mut rx) = source(&[QUERY, BLOCK], EventFilter::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = stream.run(cancel).await.unwrap();

        assert_eq!(summary.end, StreamEnd::Cancelled);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn closed_channel_stops_stream() {
        let (stream, rx) = source(&[QUERY, BLOCK], EventFilter::default());
        drop(rx);

        let summary = stream.run(CancellationToken::new()).await.unwrap();
        assert_eq!(summary.end, StreamEnd::SinkClosed);
        assert_eq!(summary.stats.events_emitted, 0);
    }
}
