use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::analytics::Sample;

/// Raw samples live in the archive for ten minutes.
pub const DEFAULT_ARCHIVE_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on a single archive write before it is abandoned.
pub const DEFAULT_ARCHIVE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("archive store did not respond within {0:?}")]
    Timeout(Duration),

    #[error("cannot encode sample: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("timestamp {0} is outside the range of unix nanoseconds")]
    KeyOutOfRange(DateTime<Utc>),
}

/// Durable, TTL-bounded key-value store for raw samples.
///
/// Writes are best-effort: nothing in the request path depends on them.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ArchiveError>;

    async fn ping(&self) -> Result<(), ArchiveError>;
}

/// TTL and timeout applied to each archive write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchivePolicy {
    pub ttl: Duration,
    pub timeout: Duration,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_ARCHIVE_TTL,
            timeout: DEFAULT_ARCHIVE_TIMEOUT,
        }
    }
}

/// `metric:<unix-nanos>`
pub fn archive_key(timestamp: &DateTime<Utc>) -> Result<String, ArchiveError> {
    let nanos = timestamp
        .timestamp_nanos_opt()
        .ok_or(ArchiveError::KeyOutOfRange(*timestamp))?;
    Ok(format!("metric:{nanos}"))
}

/// Serialize `sample` and store it under its archive key, giving up after
/// `policy.timeout`.
pub async fn archive_sample(
    store: Arc<dyn ArchiveStore>,
    sample: Sample,
    policy: ArchivePolicy,
) -> Result<String, ArchiveError> {
    let key = archive_key(&sample.timestamp)?;
    let value = serde_json::to_string(&sample)?;

    tokio::time::timeout(policy.timeout, store.put(&key, &value, policy.ttl))
        .await
        .map_err(|_| ArchiveError::Timeout(policy.timeout))??;

    Ok(key)
}
