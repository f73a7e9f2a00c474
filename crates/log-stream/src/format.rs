//! 이벤트 포맷터 -- 분류된 이벤트를 표시용 한 줄로 렌더링
//!
//! # 텍스트 레이아웃
//! ```text
//! [14:18:46] [pihole1] [laptop.local (192.168.1.100)] Oct  4 14:18:46: query[A] example.com
//! [14:18:47] [pihole1] [laptop.local (192.168.1.100)] Oct  4 14:18:47: gravity blocked ...
//! [14:18:48] [pihole2] Oct  4 14:18:48: forwarded example.com to 1.1.1.1
//! ```
//!
//! 소스 레이블은 소스별 색상, 호스트 레이블은 노란색으로 표시합니다.
//! 차단 이벤트는 시각과 소스를 굵게, 본문을 빨간색으로 표시합니다.
//! 시각은 원격 로그의 시각이 아니라 로컬에서 방출된 시각입니다.

use std::time::SystemTime;

use chrono::{DateTime, Local};
use colored::{Color, Colorize};
use dnstail_core::event::{EventKind, FormattedEvent, ParsedEvent};

use crate::error::LogStreamError;
use crate::resolver::host_label;

/// 소스 색상 팔레트 (소스 순서대로 순환)
pub const SOURCE_PALETTE: [Color; 4] = [
    Color::BrightCyan,
    Color::BrightMagenta,
    Color::BrightGreen,
    Color::BrightBlue,
];

/// 출력 형식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// 사람이 읽는 한 줄 텍스트
    #[default]
    Text,
    /// 한 줄에 JSON 객체 하나
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = LogStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(LogStreamError::Config {
                field: "output_format".to_owned(),
                reason: format!("unknown output format '{other}', expected text or json"),
            }),
        }
    }
}

/// 소스 하나에 대한 포맷터
#[derive(Debug, Clone)]
pub struct EventFormatter {
    source_id: String,
    color: Color,
    use_color: bool,
    output: OutputFormat,
}

impl EventFormatter {
    /// 포맷터를 생성합니다. `index`는 팔레트에서 색상을 고르는 데 쓰입니다.
    pub fn new(source_id: impl Into<String>, index: usize) -> Self {
        Self {
            source_id: source_id.into(),
            color: SOURCE_PALETTE[index % SOURCE_PALETTE.len()],
            use_color: true,
            output: OutputFormat::Text,
        }
    }

    /// ANSI 색상 사용 여부를 설정합니다.
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// 출력 형식을 설정합니다.
    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// 소스 식별자
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// 현재 시각으로 이벤트를 렌더링합니다.
    ///
    /// `name`은 분류된 이벤트의 해석된 이름입니다. 미분류 라인에는 무시됩니다.
    pub fn format(
        &self,
        event: &ParsedEvent,
        name: Option<&str>,
    ) -> Result<FormattedEvent, LogStreamError> {
        let now = SystemTime::now();
        self.format_at(event, name, now, DateTime::<Local>::from(now))
    }

    /// 주어진 시각으로 이벤트를 렌더링합니다.
    pub fn format_at(
        &self,
        event: &ParsedEvent,
        name: Option<&str>,
        captured_at: SystemTime,
        local: DateTime<Local>,
    ) -> Result<FormattedEvent, LogStreamError> {
        let timestamp = local.format("%H:%M:%S").to_string();
        let address = event.address().map(str::to_owned);
        let host = address
            .as_deref()
            .map(|addr| host_label(name.unwrap_or(addr), addr));

        let mut formatted = FormattedEvent {
            captured_at,
            timestamp,
            source: self.source_id.clone(),
            host,
            address,
            description: event.description().to_owned(),
            kind: event.kind(),
            line: String::new(),
        };

        formatted.line = match self.output {
            OutputFormat::Text => self.render_text(&formatted),
            OutputFormat::Json => serde_json::to_string(&formatted)?,
        };
        Ok(formatted)
    }

    fn render_text(&self, event: &FormattedEvent) -> String {
        let ts = format!("[{}]", event.timestamp);
        let source = format!("[{}]", event.source);

        if !self.use_color {
            return match &event.host {
                Some(host) => format!("{ts} {source} [{host}] {}", event.description),
                None => format!("{ts} {source} {}", event.description),
            };
        }

        let source = source.color(self.color);
        match (&event.host, event.kind) {
            (Some(host), EventKind::Block) => format!(
                "{} {} {} {}",
                ts.bold(),
                source.bold(),
                format!("[{host}]").bright_yellow(),
                event.description.bright_red()
            ),
            (Some(host), _) => format!(
                "{ts} {source} {} {}",
                format!("[{host}]").bright_yellow(),
                event.description
            ),
            (None, _) => format!("{ts} {source} {}", event.description),
        }
    }
}
