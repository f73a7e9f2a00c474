//! CLI argument definitions for dnstail.
//!
//! Uses `clap` v4 derive macros. Flags take precedence over environment
//! variables and the configuration file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use dnstail_core::config::DnstailConfig;

use crate::error::CliError;

/// Output format selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    /// One human-readable line per event.
    Text,
    /// One JSON object per line.
    Json,
}

impl OutputArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Stream live Pi-hole DNS query logs from several hosts at once.
///
/// Opens one SSH session per host, tails the query log, resolves client
/// addresses to names and merges everything into a single colored stream.
#[derive(Parser, Debug)]
#[command(name = "dnstail")]
#[command(version, about, long_about = None)]
pub struct DnstailCli {
    /// Path to a dnstail.toml configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// First Pi-hole host.
    #[arg(long)]
    pub pihole1: Option<String>,

    /// Second Pi-hole host.
    #[arg(long)]
    pub pihole2: Option<String>,

    /// Source host (repeatable). Replaces the configured host list.
    #[arg(long = "host", value_name = "HOST")]
    pub hosts: Vec<String>,

    /// SSH login name.
    #[arg(short, long)]
    pub username: Option<String>,

    /// Show only blocked queries.
    #[arg(short, long)]
    pub blocked_only: bool,

    /// Keep only events whose resolved host contains this text or whose address equals it.
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Also show lines that are neither queries nor blocks (ignored when another filter is active).
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable ANSI colors.
    #[arg(long)]
    pub no_color: bool,

    /// Output format.
    #[arg(long, value_enum)]
    pub output: Option<OutputArg>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without connecting.
    #[arg(long)]
    pub validate: bool,
}

impl DnstailCli {
    /// Load the config file (if any), apply environment and CLI overrides, then validate.
    pub async fn load_config(&self) -> Result<DnstailConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => DnstailConfig::from_file(path).await?,
            None => DnstailConfig::default(),
        };
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of a loaded configuration.
    ///
    /// `--host` replaces the host list; `--pihole1`/`--pihole2` then
    /// override the first and second entries.
    pub fn apply_overrides(&self, config: &mut DnstailConfig) {
        if !self.hosts.is_empty() {
            config.sources.hosts = self.hosts.clone();
        }
        for (index, host) in [&self.pihole1, &self.pihole2].into_iter().enumerate() {
            let Some(host) = host else { continue };
            match config.sources.hosts.get_mut(index) {
                Some(slot) => *slot = host.clone(),
                None => config.sources.hosts.push(host.clone()),
            }
        }

        if let Some(username) = &self.username {
            config.sources.username = username.clone();
        }
        if self.blocked_only {
            config.stream.blocked_only = true;
        }
        if let Some(filter) = &self.filter {
            config.stream.filter = filter.clone();
        }
        if self.verbose {
            config.stream.verbose = true;
        }
        if self.no_color {
            config.stream.color = false;
        }
        if let Some(output) = self.output {
            config.stream.output_format = output.as_str().to_owned();
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
