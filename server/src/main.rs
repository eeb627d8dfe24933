//! Steel Defect Server
//!
//! HTTP API classifying uploaded steel surface images. The classifier is
//! loaded once at startup; a missing or unreadable weight artifact stops the
//! server before it binds.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, Level};

use steel_defect::backend::{backend_name, default_device, DefaultBackend};
use steel_defect::utils::logging::{init_logging, LogConfig};
use steel_defect::{InferencePool, PipelineConfig, Predictor};

use crate::state::{AppState, ServerConfig, QUEUE_PER_WORKER};

/// Steel Defect Server
#[derive(Parser, Debug)]
#[command(name = "steel-defect-server")]
#[command(version)]
#[command(about = "HTTP API for steel surface defect classification")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "STEEL_DEFECT_PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "STEEL_DEFECT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Pipeline configuration (JSON); defaults are used when absent
    #[arg(short, long, env = "STEEL_DEFECT_CONFIG")]
    config: Option<PathBuf>,

    /// Weight artifact, overriding the configuration
    #[arg(short, long, env = "STEEL_DEFECT_WEIGHTS")]
    weights: Option<PathBuf>,

    /// Inference worker threads (defaults to the number of CPUs)
    #[arg(long, env = "STEEL_DEFECT_WORKERS")]
    workers: Option<usize>,

    /// Largest accepted upload in megabytes
    #[arg(long, env = "STEEL_DEFECT_MAX_UPLOAD_MB", default_value = "10")]
    max_upload_mb: usize,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "STEEL_DEFECT_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Requests allowed to wait for a worker before new ones get 503
    #[arg(long, env = "STEEL_DEFECT_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::production().with_level(cli.log_level);
    let _ = init_logging(&log_config);

    // Build configuration
    let mut server_config = ServerConfig {
        host: cli.host,
        port: cli.port,
        max_upload_bytes: cli.max_upload_mb.saturating_mul(1024 * 1024),
        ..ServerConfig::default()
    };
    if let Some(workers) = cli.workers {
        server_config.workers = workers;
    }
    server_config.queue_capacity = cli
        .queue_capacity
        .unwrap_or(server_config.workers.max(1) * QUEUE_PER_WORKER);

    let mut pipeline = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("cannot use configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(weights) = cli.weights {
        pipeline.model.weights = weights;
    }

    info!("Steel Defect Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Backend:     {}", backend_name());
    info!("  Weights:     {}", pipeline.model.weights.display());
    info!("  Labels:      {}", pipeline.labels.join(", "));
    info!("  Image size:  {}", pipeline.preprocess.image_size);
    info!("  Top-K:       {}", pipeline.top_k);
    info!("  Workers:     {}", server_config.workers);
    info!("  Queue:       {}", server_config.queue_capacity);
    info!("  Upload limit: {} bytes", server_config.max_upload_bytes);

    let predictor = match Predictor::<DefaultBackend>::from_config(&pipeline, &default_device()) {
        Ok(predictor) => predictor,
        Err(e) => {
            error!("Cannot start without a classifier: {}", e);
            return Err(e.into());
        }
    };

    let labels = predictor.ranker().labels().clone();
    let pool = InferencePool::spawn(
        predictor,
        server_config.workers,
        server_config.queue_capacity,
    )?;

    // Create shared state
    let state = Arc::new(AppState::new(
        pool,
        labels,
        pipeline.preprocess.image_size,
        backend_name(),
        server_config.max_upload_bytes,
    ));

    let app = routes::build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
