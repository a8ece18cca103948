use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use omadad::Config;
use omadad::Engine;
use omadad::LogLevel;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "omadad")]
#[command(about = "Presence and telemetry daemon for TP-Link Omada networks")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "omadad.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<CliLogLevel> for LogLevel {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Trace => LogLevel::Trace,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Error => LogLevel::Error,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let level = args.log_level.map(LogLevel::from).unwrap_or(config.logging.level);
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(level))
        .init();

    tracing::info!("omadad v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Loaded config from: {}", args.config.display());

    let mut engine = Engine::new();
    engine
        .register_integrations_from_config(&config)
        .await
        .context("Failed to register integrations")?;

    let api = config.api.clone().map(|api| {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let states = engine.subscribe_state();
        let handle = tokio::spawn(async move {
            if let Err(e) = omadad::api::serve(api.listen, api.port, states, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {:#}", e);
            }
        });
        (shutdown_tx, handle)
    });

    tracing::info!("Press Ctrl+C to exit");
    engine
        .run(config.system.poll_interval(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    engine.shutdown().await;

    if let Some((shutdown_tx, handle)) = api {
        shutdown_tx.send(()).ok();
        if let Err(e) = handle.await {
            tracing::warn!("HTTP API task error: {}", e);
        }
    }

    tracing::info!("omadad shutdown complete");
    Ok(())
}
