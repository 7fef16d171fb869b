//! CLI definition using clap derive. Every `serve` option can also come from
//! the environment, which is how container deployments configure it.

use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::analytics::DEFAULT_WINDOW_SIZE;
use crate::archive::ArchivePolicy;

#[derive(Parser)]
#[command(
    name = "rolling-analytics",
    about = "Ingest CPU/RPS samples and serve a live rolling average",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    // used when no subcommand is given
    #[command(flatten)]
    pub serve: ServeOpts,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve(ServeOpts),
    /// Drive synthetic traffic against a running service
    Loadgen(LoadgenOpts),
}

#[derive(Args, Debug, Clone)]
pub struct ServeOpts {
    /// Archive Redis address, `host:port` or a `redis://` URL
    #[arg(long, env = "REDIS_HOST", default_value = "localhost:6379")]
    pub redis_host: String,

    /// HTTP listen port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Number of most recent samples in the rolling window
    #[arg(long, env = "WINDOW_SIZE", default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: NonZeroUsize,

    /// Lifetime of archived samples in Redis (seconds)
    #[arg(long, env = "ARCHIVE_TTL_SECS", default_value_t = 600)]
    pub archive_ttl_secs: u64,

    /// Give up on an archive write after this many milliseconds
    #[arg(long, env = "ARCHIVE_TIMEOUT_MS", default_value_t = 500)]
    pub archive_timeout_ms: u64,

    /// Health-check ping timeout in milliseconds
    #[arg(long, env = "HEALTH_TIMEOUT_MS", default_value_t = 1000)]
    pub health_timeout_ms: u64,

    /// Requests slower than this are logged (milliseconds)
    #[arg(long, env = "SLOW_REQUEST_MS", default_value_t = 100)]
    pub slow_request_ms: u64,
}

impl ServeOpts {
    pub fn archive_policy(&self) -> ArchivePolicy {
        ArchivePolicy {
            ttl: Duration::from_secs(self.archive_ttl_secs),
            timeout: Duration::from_millis(self.archive_timeout_ms),
        }
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoadgenOpts {
    /// Base URL of the service under test
    #[arg(long, env = "LOADGEN_TARGET", default_value = "http://localhost:8080")]
    pub target: String,

    /// Concurrent simulated clients
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=500))]
    pub users: u32,

    /// How long to run (seconds)
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub duration_secs: u64,

    /// Base seed for the per-user RNGs
    #[arg(long, default_value_t = 1000)]
    pub seed: u64,
}
