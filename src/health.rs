use std::sync::Arc;
use std::time::Duration;

use crate::archive::{ArchiveError, ArchiveStore};

/// Liveness check against the archive store. Informational only: ingestion
/// keeps working while this reports unhealthy.
pub struct HealthProbe {
    archive: Arc<dyn ArchiveStore>,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(archive: Arc<dyn ArchiveStore>, timeout: Duration) -> Self {
        Self { archive, timeout }
    }

    pub async fn check(&self) -> Result<(), ArchiveError> {
        tokio::time::timeout(self.timeout, self.archive.ping())
            .await
            .map_err(|_| ArchiveError::Timeout(self.timeout))?
    }
}
