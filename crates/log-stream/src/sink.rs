//! 병합 싱크 -- 병합 채널의 단일 소비자
//!
//! 채널에서 꺼낸 순서 그대로 한 줄씩 출력 경계에 쓰고 즉시 flush합니다.
//! 재정렬이나 채널 외의 버퍼링은 없습니다. 출력 경계에는 이 싱크만 씁니다.

use dnstail_core::event::FormattedEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::LogStreamError;

/// 싱크 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEnd {
    /// 모든 송신측이 닫히고 채널이 비었음
    Drained,
    /// 취소 신호를 받음
    Cancelled,
}

/// 병합 싱크
pub struct MergeSink<W> {
    rx: mpsc::Receiver<FormattedEvent>,
    writer: W,
    written: u64,
}

impl<W> MergeSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// 새 싱크를 생성합니다.
    pub fn new(rx: mpsc::Receiver<FormattedEvent>, writer: W) -> Self {
        Self {
            rx,
            writer,
            written: 0,
        }
    }

    /// 지금까지 쓴 이벤트 수
    pub fn written(&self) -> u64 {
        self.written
    }

    /// 취소되거나 채널이 닫히고 비워질 때까지 이벤트를 씁니다.
    ///
    /// 쓰기 실패는 에러로 반환합니다 (예: 파이프가 닫힘).
    /// 쓰기나 flush가 대기 중일 때도 취소되면 즉시 `Cancelled`로 끝납니다.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<SinkEnd, LogStreamError> {
        debug!("merge sink started");

        let end = loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break SinkEnd::Cancelled,
                event = self.rx.recv() => event,
            };

            let Some(event) = event else {
                break SinkEnd::Drained;
            };

            // 출력이 막혀 있어도 취소에는 응답해야 함
            tokio::select! {
                biased;
                () = cancel.cancelled() => break SinkEnd::Cancelled,
                written = self.write_event(&event) => written?,
            }
        };

        // 이후의 send가 대기하지 않고 실패하도록 수신측을 닫음
        self.rx.close();
        if end == SinkEnd::Drained {
            self.writer.flush().await?;
        }
        info!(written = self.written, end = ?end, "merge sink stopped");
        Ok(end)
    }

    async fn write_event(&mut self, event: &FormattedEvent) -> Result<(), LogStreamError> {
        self.writer.write_all(event.line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        self.written += 1;
        Ok(())
    }

    /// 싱크를 해체하고 writer를 반환합니다.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
