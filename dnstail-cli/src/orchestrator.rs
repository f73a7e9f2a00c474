//! Run orchestration -- session opening, merge supervision, and shutdown.
//!
//! The [`Orchestrator`] wires a [`Transport`] and a [`ReverseLookup`] into a
//! [`MergePipeline`], opens every configured source concurrently, streams
//! until all sources end or the user interrupts, and reports a [`RunStatus`].
//!
//! # Lifecycle
//!
//! 1. Open all sessions concurrently (any failure closes the opened ones).
//!    Opening only starts the session process; authentication or reachability
//!    failures surface later as a transport error from that source.
//! 2. Spawn one source task per session plus the merge sink
//! 3. Wait for completion, a fatal error, or SIGINT/SIGTERM
//! 4. Close every session and log a per-source summary

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use dnstail_core::config::DnstailConfig;
use dnstail_core::error::ResolveError;
use dnstail_core::pipeline::{ReverseLookup, Transport};
use dnstail_stream::{
    DisabledLookup, HickoryLookup, MergePipeline, MergePipelineBuilder, RunOutcome, SshTransport,
    open_sessions,
};

use crate::error::CliError;

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every source reached end of stream.
    Completed,
    /// Stopped by the user (Ctrl+C or SIGTERM).
    Interrupted,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Interrupted => 130,
        }
    }
}

/// Reverse lookup backend chosen from `[resolver]`.
#[derive(Clone)]
pub enum LookupBackend {
    /// PTR lookups through the system resolver.
    Hickory(HickoryLookup),
    /// Lookups disabled; addresses are shown as-is.
    Disabled(DisabledLookup),
}

impl LookupBackend {
    /// Build the backend from configuration.
    ///
    /// Falls back to [`LookupBackend::Disabled`] when the system resolver
    /// configuration cannot be read.
    pub fn from_config(config: &DnstailConfig) -> Self {
        if !config.resolver.enabled {
            return Self::Disabled(DisabledLookup);
        }
        let timeout = Duration::from_millis(config.resolver.lookup_timeout_ms);
        match HickoryLookup::from_system_conf(timeout) {
            Ok(lookup) => Self::Hickory(lookup),
            Err(e) => {
                tracing::warn!(error = %e, "reverse lookup unavailable, showing raw addresses");
                Self::Disabled(DisabledLookup)
            }
        }
    }
}

impl ReverseLookup for LookupBackend {
    async fn reverse_lookup(&self, address: &str) -> Result<String, ResolveError> {
        match self {
            Self::Hickory(lookup) => lookup.reverse_lookup(address).await,
            Self::Disabled(lookup) => lookup.reverse_lookup(address).await,
        }
    }
}

/// The run orchestrator.
pub struct Orchestrator<T, L> {
    /// Loaded and validated configuration.
    config: DnstailConfig,
    /// Session transport shared by all sources.
    transport: Arc<T>,
    /// Merge pipeline built from `[stream]`.
    pipeline: MergePipeline<L>,
    /// Print connection banners to stderr.
    banners: bool,
}

impl Orchestrator<SshTransport, LookupBackend> {
    /// Build the production orchestrator (system `ssh` + system resolver).
    pub fn build(config: DnstailConfig) -> Result<Self, CliError> {
        let transport = Arc::new(SshTransport::from_config(&config.sources));
        let lookup = Arc::new(LookupBackend::from_config(&config));
        Self::with_parts(config, transport, lookup)
    }

    /// Run against stdout until completion or SIGINT/SIGTERM.
    ///
    /// # Errors
    ///
    /// Fails before connecting if the signal handlers cannot be installed.
    pub async fn run_until_signal(&self) -> Result<RunStatus, CliError> {
        let signals = ShutdownSignals::install()?;
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(watch_signals(signals.recv(), cancel.clone()));

        let result = self.run(tokio::io::stdout(), cancel).await;
        watcher.abort();
        result
    }
}

impl<T, L> Orchestrator<T, L>
where
    T: Transport,
    L: ReverseLookup,
{
    /// Build from explicit collaborators.
    ///
    /// Useful for testing with in-memory transports.
    pub fn with_parts(
        config: DnstailConfig,
        transport: Arc<T>,
        lookup: Arc<L>,
    ) -> Result<Self, CliError> {
        config.validate()?;

        let pipeline = MergePipelineBuilder::new()
            .config(&config)
            .map_err(|e| CliError::Config(e.to_string()))?
            .build(lookup)
            .map_err(|e| CliError::Config(e.to_string()))?;

        tracing::info!(
            sources = config.sources.hosts.len(),
            blocked_only = config.stream.blocked_only,
            filter = %config.stream.filter,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            transport,
            pipeline,
            banners: true,
        })
    }

    /// Enable or disable the stderr connection banners.
    pub fn with_banners(mut self, banners: bool) -> Self {
        self.banners = banners;
        self
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &DnstailConfig {
        &self.config
    }

    /// Open all sessions and stream into `writer` until completion or `cancel`.
    ///
    /// User cancellation yields [`RunStatus::Interrupted`]; a transport or
    /// output failure on any source is returned as an error after every
    /// other source has been stopped.
    pub async fn run<W>(&self, writer: W, cancel: CancellationToken) -> Result<RunStatus, CliError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let hosts = &self.config.sources.hosts;
        self.banner(format!("Connecting to {}...", hosts.join(", ")).bold().to_string());

        let sessions = tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("cancelled while connecting");
                self.banner("Stopping...".yellow().to_string());
                return Ok(RunStatus::Interrupted);
            }
            sessions = open_sessions(Arc::clone(&self.transport), hosts) => sessions?,
        };

        self.banner(started_banner(hosts).green().to_string());
        self.banner(
            "Streaming logs... (Press Ctrl+C to stop)\n"
                .bold()
                .to_string(),
        );

        let report = self.pipeline.run(sessions, writer, cancel).await?;

        for summary in &report.sources {
            tracing::info!(
                source = %summary.source_id,
                end = ?summary.end,
                lines_read = summary.stats.lines_read,
                events_emitted = summary.stats.events_emitted,
                events_filtered = summary.stats.events_filtered,
                orphan_blocks = summary.stats.orphan_blocks,
                "source summary"
            );
        }

        Ok(match report.outcome {
            RunOutcome::Completed => {
                tracing::info!(written = report.written, "all sources reached end of stream");
                RunStatus::Completed
            }
            RunOutcome::Interrupted => {
                self.banner(format!("\n{}", "Stopping...".yellow()));
                RunStatus::Interrupted
            }
        })
    }

    fn banner(&self, message: String) {
        if self.banners {
            eprintln!("{message}");
        }
    }
}

/// Banner printed once every session process has started.
fn started_banner(hosts: &[String]) -> String {
    format!("Started sessions to {}", hosts.join(", "))
}

/// Cancel `token` once `signal` reports a shutdown signal.
///
/// If signal delivery fails the run keeps going without signal cancellation.
async fn watch_signals<F>(signal: F, token: CancellationToken)
where
    F: Future<Output = Result<&'static str>>,
{
    match signal.await {
        Ok(signal) => {
            tracing::info!(signal = signal, "shutdown signal received");
            token.cancel();
        }
        Err(e) => tracing::error!(error = %e, "signal handling lost, continuing without it"),
    }
}

/// Installed SIGTERM/SIGINT handlers.
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Install the handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed.
    fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for a shutdown signal and return its name.
    async fn recv(mut self) -> Result<&'static str> {
        Ok(tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        })
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> Result<&'static str> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
        Ok("Ctrl+C")
    }
}
