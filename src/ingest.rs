use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analytics::{Sample, SampleInput, WindowAggregator};
use crate::archive::{archive_sample, ArchivePolicy, ArchiveStore};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}

/// Body returned by `POST /metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub status: &'static str,
    pub rps: f64,
    pub cpu: f64,
    pub avg_rps: f64,
    pub timestamp: DateTime<Utc>,
}

/// Accepts raw sample payloads, archives them best-effort, and folds them
/// into the live window.
pub struct IngestionService {
    window: Arc<WindowAggregator>,
    archive: Arc<dyn ArchiveStore>,
    policy: ArchivePolicy,
}

impl IngestionService {
    pub fn new(
        window: Arc<WindowAggregator>,
        archive: Arc<dyn ArchiveStore>,
        policy: ArchivePolicy,
    ) -> Self {
        Self {
            window,
            archive,
            policy,
        }
    }

    /// Decode `raw`, archive the sample in the background, and add it to the
    /// window. Only a decode failure reaches the caller; the window is left
    /// untouched in that case.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, raw: &[u8]) -> Result<SubmitResponse, IngestError> {
        let input: SampleInput = serde_json::from_slice(raw)?;
        let sample = input.resolve(Utc::now());

        debug!(rps = sample.rps, cpu = sample.cpu, "received metric");

        self.spawn_archive(sample);
        let avg_rps = self.window.add(sample);

        Ok(SubmitResponse {
            status: "processed",
            rps: sample.rps,
            cpu: sample.cpu,
            avg_rps,
            timestamp: sample.timestamp,
        })
    }

    fn spawn_archive(&self, sample: Sample) {
        let store = Arc::clone(&self.archive);
        let policy = self.policy;

        tokio::spawn(async move {
            match archive_sample(store, sample, policy).await {
                Ok(key) => debug!(%key, "archived sample"),
                Err(e) => warn!(
                    timestamp = %sample.timestamp,
                    error = %e,
                    "failed to archive sample"
                ),
            }
        });
    }
}
