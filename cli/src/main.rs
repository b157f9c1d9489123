use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use ckan_kobo_core::UreqTransport;
use ckan_to_kobo::{run_sync, AppConfig, Cli, SyncOutcome, TerminalConfirm};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run_app(&cli) {
        Ok(outcome) => {
            tracing::info!(?outcome, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("sync failed: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ckan_to_kobo=info,ckan_kobo_core=info".into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn run_app(cli: &Cli) -> Result<SyncOutcome> {
    let config = AppConfig::load_from_json(&cli.config).context(format!(
        "Failed to load configuration from {}",
        cli.config.display()
    ))?;

    let transport = UreqTransport::new();
    let mut confirm = TerminalConfirm::stdio();
    let mut out = io::stdout();
    let outcome = run_sync(&cli.sync_options(), &config, &transport, &mut confirm, &mut out)?;
    Ok(outcome)
}
