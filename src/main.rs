//! planforge CLI entry point.
//!
//! Loads configuration, initializes logging (stdout plus the configured
//! log file), and delegates to the CLI module.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = planforge::cli::parse_cli();
    let config = planforge::pipeline::PipelineConfig::load_or_init(&cli.config)?;

    // Priority: RUST_LOG env var > --log-level CLI arg > configured level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        cli.log_level
            .clone()
            .unwrap_or_else(|| config.log_level.clone())
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(log_file))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    planforge::cli::run_with_cli(cli, config).await
}
