//! 에러 타입 -- 도메인별 에러 정의
//!
//! 분류 기준:
//! - [`TransportError`]: 원격 세션 열기/읽기 실패. 해당 소스에 치명적이며 상위로 전파됩니다.
//! - [`ResolveError`]: 역방향 조회 실패. 리졸버 내부에서 네거티브 캐싱으로 복구되며
//!   절대 상위로 전파되지 않습니다.
//! - [`ConfigError`], [`PipelineError`]: 설정 및 태스크 관련 에러

/// dnstail 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DnstailError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 원격 세션 에러
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 원격 세션(transport) 에러
///
/// 세션을 열 수 없거나 스트림 도중 실패한 경우입니다.
/// 코어는 라인 단위 재시도를 하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 세션 프로세스 생성 실패
    #[error("failed to open session to {source_id}: {reason}")]
    Spawn { source_id: String, reason: String },

    /// 스트림 읽기 실패
    #[error("read failed on {source_id}: {reason}")]
    Read { source_id: String, reason: String },

    /// 세션이 비정상 종료됨
    #[error("session to {source_id} exited with {status}: {stderr}")]
    Exited {
        source_id: String,
        status: String,
        stderr: String,
    },

    /// 세션 프로세스가 제한 시간 안에 종료되지 않음
    #[error("session to {source_id} did not terminate within {secs}s")]
    Timeout { source_id: String, secs: u64 },

    /// 세션 종료 실패
    #[error("failed to close session to {source_id}: {reason}")]
    Close { source_id: String, reason: String },
}

impl TransportError {
    /// 에러가 발생한 소스 식별자를 반환합니다.
    pub fn source_id(&self) -> &str {
        match self {
            Self::Spawn { source_id, .. }
            | Self::Read { source_id, .. }
            | Self::Exited { source_id, .. }
            | Self::Timeout { source_id, .. }
            | Self::Close { source_id, .. } => source_id,
        }
    }
}

/// 역방향 조회 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// IP 주소로 해석할 수 없는 문자열
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// 조회 실패
    #[error("lookup failed for {address}: {reason}")]
    Lookup { address: String, reason: String },

    /// PTR 레코드 없음
    #[error("no name found for {0}")]
    NotFound(String),

    /// 조회 시간 초과
    #[error("lookup timed out for {0}")]
    Timeout(String),

    /// 조회가 비활성화됨
    #[error("reverse lookup disabled")]
    Disabled,
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}
