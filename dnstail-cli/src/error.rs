//! CLI-specific error types and exit code mapping

use dnstail_core::error::DnstailError;
use dnstail_stream::LogStreamError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Streaming failed (session could not be opened or failed mid-stream).
    #[error("{0}")]
    Stream(#[from] LogStreamError),

    /// Any other startup or runtime failure.
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                     |
    /// |------|-----------------------------|
    /// | 1    | Fatal streaming / run error |
    /// | 2    | Configuration error         |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Stream(_) | Self::Other(_) => 1,
        }
    }
}

impl From<DnstailError> for CliError {
    fn from(e: DnstailError) -> Self {
        match e {
            DnstailError::Config(e) => Self::Config(e.to_string()),
            other => Self::Other(other.into()),
        }
    }
}
