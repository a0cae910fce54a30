//! InsightPipe service binary.
//!
//! # Usage
//!
//! ```bash
//! # Run with sled persistence in ./insightpipe-data
//! insightpipe
//!
//! # Custom bind address and data directory
//! insightpipe --addr 0.0.0.0:9090 --data-dir /var/lib/insightpipe
//!
//! # Ephemeral in-memory storage (demos, tests)
//! insightpipe --memory
//! ```
//!
//! # Environment Variables
//!
//! - `INSIGHTPIPE_CONFIG`: Path to a TOML config file
//! - `INSIGHTPIPE_API_KEY`: Inference provider API key
//! - `RUST_LOG`: Logging level (default: info)

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use insightpipe::analysis::{AnalysisConfig, AnalysisPipeline, HttpInferenceClient};
use insightpipe::api::{build_router, AppState};
use insightpipe::repository::{MemoryRepository, Repository, SledRepository};
use insightpipe::{
    AnalysisCaches, Config, ParticipantLifecycle, ResponseIngestor, StudyService, TaskSequencer,
};

#[derive(Parser, Debug)]
#[command(name = "insightpipe")]
#[command(about = "Study execution pipeline for consumer research")]
#[command(version)]
struct CliArgs {
    /// Override the server bind address (default from config: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Override the sled data directory
    #[arg(long)]
    data_dir: Option<String>,

    /// Use ephemeral in-memory storage instead of sled
    #[arg(long)]
    memory: bool,

    /// Delete the data directory on startup.
    /// WARNING: destructive and cannot be undone.
    #[arg(long)]
    reset_db: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let mut config = Config::load();
    if let Some(addr) = args.addr {
        config.server.bind_address = addr;
    }
    if let Some(dir) = args.data_dir {
        config.server.data_dir = dir.into();
    }
    config.validate().context("invalid configuration")?;

    if args.reset_db && !args.memory && config.server.data_dir.exists() {
        warn!(dir = %config.server.data_dir.display(), "resetting data directory");
        std::fs::remove_dir_all(&config.server.data_dir)
            .context("failed to reset data directory")?;
    }

    let repo: Arc<dyn Repository> = if args.memory {
        warn!("using in-memory storage, data will not survive restart");
        Arc::new(MemoryRepository::new())
    } else {
        Arc::new(
            SledRepository::open(&config.server.data_dir)
                .context("failed to open sled database")?,
        )
    };
    info!(backend = repo.backend_name(), "storage ready");

    let api_key = config.api_key();
    if api_key.is_empty() {
        warn!(
            env = %config.inference.api_key_env,
            "inference API key not set, analysis endpoints will fail until it is"
        );
    }
    let client = Arc::new(
        HttpInferenceClient::new(
            &config.inference.base_url,
            (!api_key.is_empty()).then_some(api_key),
            &config.inference.model,
            config.request_timeout(),
        )
        .map_err(|e| anyhow::anyhow!("failed to build inference client: {e}"))?,
    );

    let caches = Arc::new(AnalysisCaches::new());
    let analysis_config = AnalysisConfig {
        max_attempts: config.inference.max_attempts,
        backoff_base: config.backoff_base(),
        min_responses: config.inference.min_responses,
    };

    let state = AppState {
        studies: Arc::new(StudyService::new(Arc::clone(&repo))),
        sequencer: Arc::new(TaskSequencer::new(Arc::clone(&repo))),
        lifecycle: Arc::new(ParticipantLifecycle::new(Arc::clone(&repo))),
        ingestor: Arc::new(ResponseIngestor::new(Arc::clone(&repo), Arc::clone(&caches))),
        pipeline: Arc::new(AnalysisPipeline::new(repo, client, caches, analysis_config)),
        started_at: Instant::now(),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;
    info!(addr = %config.server.bind_address, "insightpipe listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}
