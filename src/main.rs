use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod analytics;
mod archive;
mod cli;
mod handlers;
mod health;
mod ingest;
mod instrumentation;
mod load_generator;
mod middleware;
mod redis_client;
mod server;
#[cfg(test)]
mod testing;

use analytics::WindowAggregator;
use archive::ArchiveStore;
use health::HealthProbe;
use ingest::IngestionService;
use instrumentation::RequestMetrics;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Decodes, archives and aggregates submitted samples.
    pub ingest: IngestionService,

    /// The live rolling window. Ingestion writes, analytics reads.
    pub window: Arc<WindowAggregator>,

    /// Archive connectivity check behind `GET /health`.
    pub health: HealthProbe,

    /// Per-request counters and histograms behind `GET /metrics/prometheus`.
    pub requests: RequestMetrics,

    /// Requests slower than this are logged as warnings.
    pub slow_request_threshold: Duration,
}

impl AppState {
    pub fn new(
        opts: &cli::ServeOpts,
        archive: Arc<dyn ArchiveStore>,
    ) -> Result<Self, prometheus::Error> {
        let window = Arc::new(WindowAggregator::new(opts.window_size));

        Ok(Self {
            ingest: IngestionService::new(
                Arc::clone(&window),
                Arc::clone(&archive),
                opts.archive_policy(),
            ),
            window,
            health: HealthProbe::new(archive, opts.health_timeout()),
            requests: RequestMetrics::new()?,
            slow_request_threshold: opts.slow_request_threshold(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let args = cli::Cli::parse();

    match args.command.unwrap_or(cli::Command::Serve(args.serve)) {
        cli::Command::Serve(opts) => serve(opts).await,
        cli::Command::Loadgen(opts) => {
            let report = load_generator::run(opts)
                .await
                .context("failed to build HTTP client")?;
            println!();
            println!("{report}");
            Ok(())
        }
    }
}

async fn serve(opts: cli::ServeOpts) -> anyhow::Result<()> {
    // ── 1. Archive store (connects lazily) ───────────────────────
    let archive = redis_client::RedisArchive::open(&opts.redis_host)
        .with_context(|| format!("invalid Redis address {:?}", opts.redis_host))?;

    // ── 2. Build shared state ────────────────────────────────────
    let state = Arc::new(
        AppState::new(&opts, Arc::new(archive)).context("failed to register request metrics")?,
    );

    info!(
        redis = %opts.redis_host,
        window_size = state.window.capacity(),
        "rolling analytics service starting"
    );

    // ── 3. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
}
