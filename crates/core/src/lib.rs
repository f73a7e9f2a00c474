//! dnstail 공통 크레이트
//!
//! 여러 원격 DNS 로그 소스를 병합하는 파이프라인의 공통 타입, 에러, 설정,
//! 외부 협력자 trait을 정의합니다.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, DnstailError, PipelineError, ResolveError, TransportError};

// 설정
pub use config::DnstailConfig;

// 이벤트
pub use event::{EventKind, FormattedEvent, ParsedEvent};

// 협력자 trait
pub use pipeline::{LineStream, ReverseLookup, Transport};
