//! Traffic Light — status endpoint poller.
//!
//! Polls a JSON status endpoint on a fixed interval and writes every answer
//! to the diagnostic log. Failed or slow cycles are absorbed; the next tick
//! simply tries again. Runs until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod error;
mod logging;
mod poller;
mod reporter;
mod source;

use config::{Overrides, PollerConfig};
use poller::Poller;
use reporter::LogReporter;
use source::HttpSource;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (JSON, or YAML by extension)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.json_logs);

    info!("🚦 Traffic Light v{}", env!("CARGO_PKG_VERSION"));

    let mut config = PollerConfig::load(cli.config.as_deref())?;
    config.apply(cli.overrides);
    config.validate().context("Invalid configuration")?;

    let source = HttpSource::new(&config.base_url, &config.path, config.timeout())?;
    info!(url = %source.url(), "Status endpoint resolved");

    let poller = Poller::new(
        Arc::new(source),
        Arc::new(LogReporter::new()),
        config.interval(),
        config.timeout(),
    );
    info!(interval = ?poller.interval(), "Poller configured");
    let handle = poller.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    if !handle.is_running() {
        warn!("Poller exited before shutdown was requested");
    }
    info!(cycles = handle.stats().cycles, "Shutdown requested");
    let stats = handle.stop().await;
    if let Some(at) = stats.last_success_at {
        info!(last_success_at = %at.to_rfc3339(), "Last status received");
    }

    Ok(())
}
