//! Readmission Risk Service - Main Entry Point

use anyhow::Context;
use api::{init_logging, install_metrics, run_server, AppState, Settings};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "readmission-service", version, about = "Hospital readmission risk service")]
struct Cli {
    /// Configuration file (TOML); missing files fall back to defaults
    #[arg(long, value_name = "PATH", default_value = "readmission.toml")]
    config: PathBuf,

    /// Bind address, overriding `server.addr`
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(addr) = cli.addr {
        settings.server.addr = addr;
    }

    init_logging(&settings.logging).map_err(anyhow::Error::msg)?;

    info!("=== Readmission Risk Service v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Loading model artifacts...");

    let mut state = AppState::load(&settings).with_context(|| {
        format!(
            "loading model artifacts ({}, {})",
            settings.model.bundle_path.display(),
            settings.model.threshold_path.display()
        )
    })?;
    if let Some(handle) = install_metrics() {
        state = state.with_metrics(handle);
    }

    run_server(state, &settings.server.addr).await
}
