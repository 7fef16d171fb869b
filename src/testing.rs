//! In-memory stand-ins shared by the unit tests.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::archive::{ArchiveError, ArchiveStore};
use crate::cli::ServeOpts;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    Healthy,
    /// Every call fails with a connection-refused style redis error.
    Failing,
    /// Every call blocks forever.
    Hanging,
}

/// One `put` attempt, successful or not.
#[derive(Debug, Clone)]
pub struct ArchivedWrite {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

pub struct FakeArchive {
    mode: ArchiveMode,
    writes: mpsc::UnboundedSender<ArchivedWrite>,
}

impl FakeArchive {
    pub fn new(mode: ArchiveMode) -> (Arc<Self>, mpsc::UnboundedReceiver<ArchivedWrite>) {
        let (writes, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { mode, writes }), rx)
    }

    async fn respond(&self) -> Result<(), ArchiveError> {
        match self.mode {
            ArchiveMode::Healthy => Ok(()),
            ArchiveMode::Failing => Err(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))
            .into()),
            ArchiveMode::Hanging => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ArchiveStore for FakeArchive {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ArchiveError> {
        let _ = self.writes.send(ArchivedWrite {
            key: key.to_owned(),
            value: value.to_owned(),
            ttl,
        });
        self.respond().await
    }

    async fn ping(&self) -> Result<(), ArchiveError> {
        self.respond().await
    }
}

/// Builds the full application state around `archive` with a window of
/// `capacity` samples and short timeouts.
pub fn app_state(capacity: usize, archive: Arc<dyn ArchiveStore>) -> Arc<AppState> {
    let opts = ServeOpts {
        redis_host: "unused:0".into(),
        port: 0,
        window_size: NonZeroUsize::new(capacity).expect("capacity must be non-zero"),
        archive_ttl_secs: 600,
        archive_timeout_ms: 50,
        health_timeout_ms: 50,
        slow_request_ms: 100,
    };
    Arc::new(AppState::new(&opts, archive).expect("metrics registry"))
}
