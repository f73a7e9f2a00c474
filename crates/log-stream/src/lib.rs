#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`classifier`]: 질의/차단 라인 분류와 소스별 주소 연관
//! - [`resolver`]: 주소 → 이름 역방향 조회와 네거티브 캐싱
//! - [`filter`]: 차단 전용 모드와 호스트 필터
//! - [`format`]: 텍스트/JSON 렌더링
//! - [`source`]: 원격 세션 하나를 구동하는 소스 스트림
//! - [`sink`]: 병합 채널의 단일 소비자
//! - [`pipeline`]: 세션 열기와 태스크 감독
//! - [`transport`]: SSH 세션 구현
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Transport -> SourceStream(classify -> resolve -> filter -> format) -> mpsc -> MergeSink -> stdout
//!                  x N sources                                         (single consumer)
//! ```

pub mod classifier;
pub mod error;
pub mod filter;
pub mod format;
pub mod pipeline;
pub mod resolver;
pub mod sink;
pub mod source;
pub mod state;
pub mod transport;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{MergePipeline, MergePipelineBuilder, RunOutcome, RunReport, Session, open_sessions};

// 에러
pub use error::LogStreamError;

// 분류/해석
pub use classifier::LineClassifier;
pub use resolver::{DisabledLookup, HickoryLookup, ResolverCache, resolve};
pub use state::SourceState;

// 필터/포맷
pub use filter::EventFilter;
pub use format::{EventFormatter, OutputFormat};

// 소스/싱크
pub use sink::{MergeSink, SinkEnd};
pub use source::{SourceStats, SourceStream, SourceSummary, StreamEnd};

// transport
pub use transport::{SshLineStream, SshTransport};
