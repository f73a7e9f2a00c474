//! 설정 관리 -- dnstail.toml 파싱 및 런타임 설정
//!
//! [`DnstailConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DNSTAIL_SOURCES_USERNAME=admin` 형식)
//! 3. 설정 파일 (`dnstail.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dnstail_core::error::DnstailError> {
//! use dnstail_core::config::DnstailConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DnstailConfig::load("dnstail.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DnstailConfig::parse("[stream]\nblocked_only = true")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DnstailError};

/// 차단 라인을 식별하는 기본 문구 (대소문자 무시)
pub const DEFAULT_BLOCK_PHRASES: &[&str] = &["gravity blocked", "exactly blocked", "exactly denied"];

/// dnstail 통합 설정
///
/// `dnstail.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnstailConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 원격 소스 설정
    #[serde(default)]
    pub sources: SourcesConfig,
    /// 스트림 필터/출력 설정
    #[serde(default)]
    pub stream: StreamConfig,
    /// 역방향 조회 설정
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DnstailConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DnstailError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DnstailError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DnstailError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DnstailError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DnstailError> {
        toml::from_str(toml_str).map_err(|e| {
            DnstailError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DNSTAIL_{SECTION}_{FIELD}`
    /// 예: `DNSTAIL_STREAM_BLOCKED_ONLY=true`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DNSTAIL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DNSTAIL_GENERAL_LOG_FORMAT");

        // Sources
        override_csv(&mut self.sources.hosts, "DNSTAIL_SOURCES_HOSTS");
        override_string(&mut self.sources.username, "DNSTAIL_SOURCES_USERNAME");
        override_string(
            &mut self.sources.remote_command,
            "DNSTAIL_SOURCES_REMOTE_COMMAND",
        );
        override_string(&mut self.sources.ssh_binary, "DNSTAIL_SOURCES_SSH_BINARY");
        override_u64(
            &mut self.sources.connect_timeout_secs,
            "DNSTAIL_SOURCES_CONNECT_TIMEOUT_SECS",
        );

        // Stream
        override_bool(&mut self.stream.blocked_only, "DNSTAIL_STREAM_BLOCKED_ONLY");
        override_string(&mut self.stream.filter, "DNSTAIL_STREAM_FILTER");
        override_bool(&mut self.stream.verbose, "DNSTAIL_STREAM_VERBOSE");
        override_usize(
            &mut self.stream.channel_capacity,
            "DNSTAIL_STREAM_CHANNEL_CAPACITY",
        );
        override_bool(&mut self.stream.color, "DNSTAIL_STREAM_COLOR");
        override_string(
            &mut self.stream.output_format,
            "DNSTAIL_STREAM_OUTPUT_FORMAT",
        );

        // Resolver
        override_bool(&mut self.resolver.enabled, "DNSTAIL_RESOLVER_ENABLED");
        override_u64(
            &mut self.resolver.lookup_timeout_ms,
            "DNSTAIL_RESOLVER_LOOKUP_TIMEOUT_MS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "DNSTAIL_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "DNSTAIL_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "DNSTAIL_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DnstailError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        // 소스 목록 검증
        if self.sources.hosts.is_empty() {
            return Err(invalid(
                "sources.hosts",
                "at least one source host is required".to_owned(),
            ));
        }
        let mut seen = HashSet::new();
        for host in &self.sources.hosts {
            if host.trim().is_empty() {
                return Err(invalid(
                    "sources.hosts",
                    "host identifiers must not be empty".to_owned(),
                ));
            }
            if !seen.insert(host.as_str()) {
                return Err(invalid(
                    "sources.hosts",
                    format!("duplicate host '{host}'"),
                ));
            }
        }

        if self.sources.username.trim().is_empty() {
            return Err(invalid(
                "sources.username",
                "username must not be empty".to_owned(),
            ));
        }

        if self.sources.remote_command.trim().is_empty() {
            return Err(invalid(
                "sources.remote_command",
                "remote command must not be empty".to_owned(),
            ));
        }

        if self.sources.connect_timeout_secs == 0 {
            return Err(invalid(
                "sources.connect_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        // 스트림 설정 검증
        if self.stream.channel_capacity == 0 {
            return Err(invalid(
                "stream.channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        let valid_outputs = ["text", "json"];
        if !valid_outputs.contains(&self.stream.output_format.as_str()) {
            return Err(invalid(
                "stream.output_format",
                format!("must be one of: {}", valid_outputs.join(", ")),
            ));
        }

        if self.stream.block_phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(invalid(
                "stream.block_phrases",
                "at least one non-empty phrase is required".to_owned(),
            ));
        }

        if self.resolver.enabled && self.resolver.lookup_timeout_ms == 0 {
            return Err(invalid(
                "resolver.lookup_timeout_ms",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "must be greater than 0".to_owned()));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> DnstailError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            // stdout 스트림과 섞이지 않도록 기본은 warn
            log_level: "warn".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 원격 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// tail 대상 호스트 목록 (소스 식별자로도 사용)
    pub hosts: Vec<String>,
    /// SSH 로그인 사용자
    pub username: String,
    /// 원격에서 실행할 명령
    pub remote_command: String,
    /// ssh 클라이언트 실행 파일
    pub ssh_binary: String,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 추가 `-o` 옵션 (예: "StrictHostKeyChecking=accept-new")
    pub ssh_options: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["pihole1".to_owned(), "pihole2".to_owned()],
            username: "pi".to_owned(),
            remote_command: "sudo pihole -t".to_owned(),
            ssh_binary: "ssh".to_owned(),
            connect_timeout_secs: 10,
            ssh_options: Vec::new(),
        }
    }
}

/// 스트림 필터/출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 차단 이벤트만 표시
    pub blocked_only: bool,
    /// 호스트/주소 필터 (빈 문자열이면 필터 없음)
    pub filter: String,
    /// 다른 필터가 없을 때 미분류 라인도 표시
    pub verbose: bool,
    /// 병합 채널 용량
    pub channel_capacity: usize,
    /// ANSI 색상 사용 여부
    pub color: bool,
    /// 출력 형식 (text, json)
    pub output_format: String,
    /// 차단 라인 식별 문구 (대소문자 무시 부분 문자열)
    pub block_phrases: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            blocked_only: false,
            filter: String::new(),
            verbose: false,
            channel_capacity: 1024,
            color: true,
            output_format: "text".to_owned(),
            block_phrases: DEFAULT_BLOCK_PHRASES
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
        }
    }
}

/// 역방향 조회 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// 활성화 여부 (비활성화 시 모든 주소가 그대로 표시됨)
    pub enabled: bool,
    /// 조회 타임아웃 (밀리초)
    pub lookup_timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookup_timeout_ms: 2000,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9187,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
