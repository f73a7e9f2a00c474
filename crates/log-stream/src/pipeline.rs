//! 병합 파이프라인 -- 세션 열기와 소스/싱크 태스크 감독
//!
//! [`MergePipeline`]은 소스마다 [`SourceStream`] 태스크 하나와 [`MergeSink`] 태스크 하나를
//! 같은 [`JoinSet`] 아래에서 실행합니다.
//!
//! # 내부 아키텍처
//! ```text
//! SourceStream(pihole1) --\
//!                          +--> mpsc (bounded) --> MergeSink --> stdout
//! SourceStream(pihole2) --/
//! ```
//!
//! 어느 태스크든 치명적 에러로 끝나면 나머지를 모두 취소하고 첫 에러를 반환합니다.
//! 외부 취소(사용자 중단)는 에러가 아니라 [`RunOutcome::Interrupted`]로 보고됩니다.

use std::sync::Arc;

use dnstail_core::config::DnstailConfig;
use dnstail_core::event::FormattedEvent;
use dnstail_core::metrics as m;
use dnstail_core::pipeline::{LineStream, ReverseLookup, Transport};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classifier::LineClassifier;
use crate::error::LogStreamError;
use crate::filter::EventFilter;
use crate::format::{EventFormatter, OutputFormat};
use crate::sink::{MergeSink, SinkEnd};
use crate::source::{SourceStream, SourceSummary};

/// 기본 병합 채널 용량
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// 열린 세션 하나
pub struct Session<S> {
    /// 소스 식별자
    pub source_id: String,
    /// 라인 스트림
    pub stream: S,
}

/// 모든 소스의 세션을 동시에 엽니다.
///
/// 반환 순서는 `source_ids` 순서와 같습니다. 하나라도 실패하면 이미 열린 세션을
/// 모두 닫고 첫 에러를 반환합니다.
pub async fn open_sessions<T>(
    transport: Arc<T>,
    source_ids: &[String],
) -> Result<Vec<Session<T::Stream>>, LogStreamError>
where
    T: Transport,
{
    let mut tasks = JoinSet::new();
    for (index, source_id) in source_ids.iter().enumerate() {
        let transport = Arc::clone(&transport);
        let source_id = source_id.clone();
        tasks.spawn(async move {
            let result = transport.open(&source_id).await;
            (index, source_id, result)
        });
    }

    let mut opened: Vec<Option<Session<T::Stream>>> = source_ids.iter().map(|_| None).collect();
    let mut failure: Option<LogStreamError> = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, source_id, Ok(stream))) => {
                info!(source = %source_id, "session opened");
                opened[index] = Some(Session { source_id, stream });
            }
            Ok((_, source_id, Err(e))) => {
                metrics::counter!(m::TRANSPORT_ERRORS_TOTAL, m::LABEL_SOURCE => source_id.clone())
                    .increment(1);
                warn!(source = %source_id, error = %e, "failed to open session");
                failure.get_or_insert(e.into());
            }
            Err(e) => {
                failure.get_or_insert(LogStreamError::Task(e.to_string()));
            }
        }
    }

    if let Some(err) = failure {
        for mut session in opened.into_iter().flatten() {
            if let Err(e) = session.stream.close().await {
                warn!(source = %session.source_id, error = %e, "failed to close session");
            }
        }
        return Err(err);
    }

    Ok(opened.into_iter().flatten().collect())
}

/// 실행 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 모든 소스가 스트림 끝에 도달하고 싱크가 채널을 비움
    Completed,
    /// 외부 취소로 중단됨
    Interrupted,
}

/// 실행 보고서
#[derive(Debug)]
pub struct RunReport<W> {
    /// 결과 상태
    pub outcome: RunOutcome,
    /// 소스별 요약 (종료 순서)
    pub sources: Vec<SourceSummary>,
    /// 싱크가 쓴 이벤트 수
    pub written: u64,
    /// 싱크의 writer
    pub writer: Option<W>,
}

enum TaskDone<W> {
    Source(SourceSummary),
    Sink { end: SinkEnd, written: u64, writer: W },
}

/// 병합 파이프라인
///
/// # 사용 예시
/// ```ignore
/// let pipeline = MergePipelineBuilder::new()
///     .filter(EventFilter::new(true, None, false))
///     .build(Arc::new(DisabledLookup))?;
///
/// let sessions = open_sessions(transport, &hosts).await?;
/// let report = pipeline.run(sessions, tokio::io::stdout(), cancel).await?;
/// ```
pub struct MergePipeline<L> {
    lookup: Arc<L>,
    classifier: Arc<LineClassifier>,
    filter: EventFilter,
    use_color: bool,
    output: OutputFormat,
    channel_capacity: usize,
}

impl<L> MergePipeline<L>
where
    L: ReverseLookup,
{
    /// 열린 세션들을 병합하여 `writer`로 출력합니다.
    ///
    /// `cancel`이 취소되면 모든 태스크가 멈추고 `Interrupted`를 반환합니다.
    pub async fn run<S, W>(
        &self,
        sessions: Vec<Session<S>>,
        writer: W,
        cancel: CancellationToken,
    ) -> Result<RunReport<W>, LogStreamError>
    where
        S: LineStream,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if sessions.is_empty() {
            return Err(LogStreamError::Config {
                field: "sources".to_owned(),
                reason: "at least one session is required".to_owned(),
            });
        }

        // 내부 에러로 인한 종료와 외부 취소를 구분하기 위한 자식 토큰
        let token = cancel.child_token();
        let (tx, rx) = mpsc::channel::<FormattedEvent>(self.channel_capacity);
        let mut tasks: JoinSet<Result<TaskDone<W>, LogStreamError>> = JoinSet::new();

        for (index, session) in sessions.into_iter().enumerate() {
            let formatter = EventFormatter::new(session.source_id, index)
                .with_color(self.use_color)
                .with_output(self.output);
            let stream = SourceStream::new(
                session.stream,
                Arc::clone(&self.lookup),
                Arc::clone(&self.classifier),
                self.filter.clone(),
                formatter,
                tx.clone(),
            );
            let token = token.clone();
            tasks.spawn(async move {
                metrics::gauge!(m::STREAM_ACTIVE_SOURCES).increment(1.0);
                let result = stream.run(token).await;
                metrics::gauge!(m::STREAM_ACTIVE_SOURCES).decrement(1.0);
                result.map(TaskDone::Source)
            });
        }
        // 모든 소스가 끝나면 채널이 닫히도록 원본 송신측을 버림
        drop(tx);

        let sink_token = token.clone();
        tasks.spawn(async move {
            let mut sink = MergeSink::new(rx, writer);
            let end = sink.run(sink_token).await?;
            let written = sink.written();
            Ok(TaskDone::Sink {
                end,
                written,
                writer: sink.into_inner(),
            })
        });

        let mut sources = Vec::new();
        let mut written = 0;
        let mut writer = None;
        let mut first_error: Option<LogStreamError> = None;

        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(LogStreamError::Task(e.to_string())));
            match result {
                Ok(TaskDone::Source(summary)) => sources.push(summary),
                Ok(TaskDone::Sink {
                    end,
                    written: count,
                    writer: w,
                }) => {
                    debug!(end = ?end, written = count, "sink task finished");
                    written = count;
                    writer = Some(w);
                }
                Err(e) => {
                    if first_error.is_none() {
                        error!(error = %e, "pipeline task failed, shutting down");
                        token.cancel();
                        first_error = Some(e);
                    } else {
                        debug!(error = %e, "additional task failure during shutdown");
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let outcome = if cancel.is_cancelled() {
            RunOutcome::Interrupted
        } else {
            RunOutcome::Completed
        };
        info!(outcome = ?outcome, written, "merge pipeline finished");

        Ok(RunReport {
            outcome,
            sources,
            written,
            writer,
        })
    }
}

/// 병합 파이프라인 빌더
pub struct MergePipelineBuilder {
    block_phrases: Option<Vec<String>>,
    filter: EventFilter,
    use_color: bool,
    output: OutputFormat,
    channel_capacity: usize,
}

impl MergePipelineBuilder {
    /// 기본값으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            block_phrases: None,
            filter: EventFilter::default(),
            use_color: true,
            output: OutputFormat::Text,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// 설정 파일의 `[stream]` 섹션을 적용합니다.
    pub fn config(mut self, config: &DnstailConfig) -> Result<Self, LogStreamError> {
        let stream = &config.stream;
        self.block_phrases = Some(stream.block_phrases.clone());
        self.filter = EventFilter::from_config(stream);
        self.use_color = stream.color;
        self.output = stream.output_format.parse()?;
        self.channel_capacity = stream.channel_capacity;
        Ok(self)
    }

    /// 차단 문구를 설정합니다.
    pub fn block_phrases(mut self, phrases: Vec<String>) -> Self {
        self.block_phrases = Some(phrases);
        self
    }

    /// 이벤트 필터를 설정합니다.
    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    /// ANSI 색상 사용 여부를 설정합니다.
    pub fn color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// 출력 형식을 설정합니다.
    pub fn output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// 병합 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build<L>(self, lookup: Arc<L>) -> Result<MergePipeline<L>, LogStreamError>
    where
        L: ReverseLookup,
    {
        if self.channel_capacity == 0 {
            return Err(LogStreamError::Config {
                field: "channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let classifier = match self.block_phrases {
            Some(phrases) => LineClassifier::new(phrases)?,
            None => LineClassifier::with_defaults()?,
        };

        Ok(MergePipeline {
            lookup,
            classifier: Arc::new(classifier),
            filter: self.filter,
            use_color: self.use_color,
            output: self.output,
            channel_capacity: self.channel_capacity,
        })
    }
}

impl Default for MergePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
