//! 원격 세션 transport 구현
//!
//! - [`SshTransport`]: 시스템 `ssh` 클라이언트로 원격 명령을 실행하고 stdout을 라인 단위로 읽음

pub mod ssh;

pub use ssh::{SshLineStream, SshTransport};
