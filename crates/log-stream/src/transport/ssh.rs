//! SSH transport
//!
//! 소스마다 다음 명령을 `tokio::process`로 실행합니다.
//! ```text
//! ssh -tt -o BatchMode=yes -o ConnectTimeout=10 [-o opt]... pi@pihole1 sudo pihole -t
//! ```
//!
//! stdout이 EOF에 도달했을 때 프로세스가 실패 상태로 종료했다면 스트림 끝이 아니라
//! [`TransportError::Exited`]를 반환합니다 (stderr 포함).

use std::process::Stdio;
use std::time::Duration;

use dnstail_core::config::SourcesConfig;
use dnstail_core::error::TransportError;
use dnstail_core::pipeline::{LineStream, Transport};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::debug;

/// 종료 대기 시간
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// 보관할 stderr 최대 크기 (바이트)
const MAX_STDERR_BYTES: u64 = 8 * 1024;

/// 시스템 `ssh` 클라이언트 기반 transport
#[derive(Debug, Clone)]
pub struct SshTransport {
    ssh_binary: String,
    username: String,
    remote_command: String,
    connect_timeout_secs: u64,
    ssh_options: Vec<String>,
}

impl SshTransport {
    /// `[sources]` 설정으로 transport를 생성합니다.
    pub fn from_config(config: &SourcesConfig) -> Self {
        Self {
            ssh_binary: config.ssh_binary.clone(),
            username: config.username.clone(),
            remote_command: config.remote_command.clone(),
            connect_timeout_secs: config.connect_timeout_secs,
            ssh_options: config.ssh_options.clone(),
        }
    }

    /// `ssh`에 넘길 인자 목록을 만듭니다.
    pub fn command_args(&self, host: &str) -> Vec<String> {
        let mut args = vec![
            "-tt".to_owned(),
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-o".to_owned(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];
        for opt in &self.ssh_options {
            args.push("-o".to_owned());
            args.push(opt.clone());
        }
        args.push(format!("{}@{}", self.username, host));
        args.push(self.remote_command.clone());
        args
    }
}

impl Transport for SshTransport {
    type Stream = SshLineStream;

    /// `ssh` 프로세스를 시작합니다.
    ///
    /// 여기서는 실행 실패만 감지합니다. 인증 실패나 접속 불가는 이후
    /// `next_line`이 [`TransportError::Exited`]로 보고합니다.

    async fn open(&self, source_id: &str) -> Result<SshLineStream, TransportError> {
        let args = self.command_args(source_id);
        debug!(source = source_id, binary = %self.ssh_binary, ?args, "spawning ssh session");

        let mut child = Command::new(&self.ssh_binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn {
                source_id: source_id.to_owned(),
                reason: format!("{}: {e}", self.ssh_binary),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| TransportError::Spawn {
            source_id: source_id.to_owned(),
            reason: "stdout not captured".to_owned(),
        })?;
        let stderr = child.stderr.take();

        Ok(SshLineStream {
            source_id: source_id.to_owned(),
            child,
            stdout: BufReader::new(stdout),
            stderr,
            buf: Vec::new(),
            finished: false,
        })
    }
}

/// `ssh` 자식 프로세스의 stdout 라인 스트림
///
/// drop 시 자식 프로세스를 종료합니다.
#[derive(Debug)]
pub struct SshLineStream {
    source_id: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<ChildStderr>,
    buf: Vec<u8>,
    finished: bool,
}

impl SshLineStream {
    /// stdout EOF 이후 종료 상태를 확인합니다.
    async fn check_exit(&mut self) -> Result<Option<String>, TransportError> {
        let status = tokio::time::timeout(CLOSE_TIMEOUT, self.child.wait())
            .await
            .map_err(|_| TransportError::Timeout {
                source_id: self.source_id.clone(),
                secs: CLOSE_TIMEOUT.as_secs(),
            })?
            .map_err(|e| TransportError::Read {
                source_id: self.source_id.clone(),
                reason: format!("failed to wait for ssh: {e}"),
            })?;

        if status.success() {
            debug!(source = %self.source_id, "ssh session ended");
            return Ok(None);
        }

        Err(TransportError::Exited {
            source_id: self.source_id.clone(),
            status: status.to_string(),
            stderr: self.captured_stderr().await,
        })
    }

    async fn captured_stderr(&mut self) -> String {
        let Some(stderr) = self.stderr.take() else {
            return String::new();
        };
        let mut raw = Vec::new();
        let mut limited = stderr.take(MAX_STDERR_BYTES);
        let read = limited.read_to_end(&mut raw);
        if tokio::time::timeout(CLOSE_TIMEOUT, read).await.is_err() {
            debug!(source = %self.source_id, "timed out reading ssh stderr");
        }
        String::from_utf8_lossy(&raw).trim().to_owned()
    }
}

impl LineStream for SshLineStream {
    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        if self.finished {
            return Ok(None);
        }

        self.buf.clear();
        let n = self
            .stdout
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| TransportError::Read {
                source_id: self.source_id.clone(),
                reason: e.to_string(),
            })?;

        if n == 0 {
            self.finished = true;
            return self.check_exit().await;
        }

        // pty 출력은 CRLF로 끝나며 UTF-8이 아닌 바이트가 섞일 수 있음
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.finished = true;

        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }

        self.child.start_kill().map_err(|e| TransportError::Close {
            source_id: self.source_id.clone(),
            reason: e.to_string(),
        })?;

        tokio::time::timeout(CLOSE_TIMEOUT, self.child.wait())
            .await
            .map_err(|_| TransportError::Timeout {
                source_id: self.source_id.clone(),
                secs: CLOSE_TIMEOUT.as_secs(),
            })?
            .map_err(|e| TransportError::Close {
                source_id: self.source_id.clone(),
                reason: e.to_string(),
            })?;

        debug!(source = %self.source_id, "ssh session closed");
        Ok(())
    }
}
