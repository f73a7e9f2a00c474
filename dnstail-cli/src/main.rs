use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use dnstail_cli::cli::DnstailCli;
use dnstail_cli::error::CliError;
use dnstail_cli::logging;
use dnstail_cli::metrics_server;
use dnstail_cli::orchestrator::{Orchestrator, RunStatus};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DnstailCli::parse();

    match run(cli).await {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            eprintln!("{}", format!("Error: {e}").red());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: DnstailCli) -> Result<RunStatus, CliError> {
    let config = cli.load_config().await?;

    if cli.validate {
        println!("configuration is valid ({} sources)", config.sources.hosts.len());
        return Ok(RunStatus::Completed);
    }

    if !config.stream.color {
        colored::control::set_override(false);
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dnstail starting");

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let orchestrator = Orchestrator::build(config)?;
    let status = orchestrator.run_until_signal().await?;

    tracing::info!(status = ?status, "dnstail stopped");
    Ok(status)
}
