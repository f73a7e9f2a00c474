//! 로그 스트림 에러 타입
//!
//! [`LogStreamError`]는 소스 스트림, 병합 싱크, 감독 루프에서 발생하는 에러를 표현합니다.
//! `From<LogStreamError> for DnstailError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 역방향 조회 실패와 미분류 라인은 에러가 아니므로 여기에 없습니다.

use dnstail_core::error::{DnstailError, PipelineError, TransportError};

/// 로그 스트림 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogStreamError {
    /// 원격 세션 에러 (해당 소스에 치명적)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 출력 경계 쓰기 실패
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    /// 이벤트 직렬화 실패 (JSON 출력)
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 태스크 패닉 또는 비정상 종료
    #[error("task error: {0}")]
    Task(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogStreamError> for DnstailError {
    fn from(err: LogStreamError) -> Self {
        match err {
            LogStreamError::Transport(e) => DnstailError::Transport(e),
            LogStreamError::Output(e) => DnstailError::Io(e),
            other => DnstailError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
