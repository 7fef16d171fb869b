pub mod stream;
pub mod window;

pub use window::{WindowAggregator, WindowSnapshot, DEFAULT_WINDOW_SIZE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds from the Unix epoch to `0001-01-01T00:00:00Z`, the zero instant
/// Go clients serialize when they never set a timestamp.
const ZERO_INSTANT_SECS: i64 = -62_135_596_800;

/// One observation of CPU load and requests-per-second.
/// This is also the JSON value written to the archive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub cpu: f64,
    pub rps: f64,
}

/// The body accepted by `POST /metrics`.
///
/// `cpu` and `rps` are required numbers; `timestamp` is an optional RFC 3339
/// string. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleInput {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub cpu: f64,
    pub rps: f64,
}

impl SampleInput {
    /// Builds the immutable `Sample`, stamping it with `now` when the client
    /// left the timestamp unset.
    pub fn resolve(self, now: DateTime<Utc>) -> Sample {
        let timestamp = match self.timestamp {
            Some(ts) if !is_unset(&ts) => ts,
            _ => now,
        };
        Sample {
            timestamp,
            cpu: self.cpu,
            rps: self.rps,
        }
    }
}

/// Both the Unix epoch and the Go zero instant count as "not provided".
fn is_unset(ts: &DateTime<Utc>) -> bool {
    ts.timestamp_subsec_nanos() == 0
        && (ts.timestamp() == 0 || ts.timestamp() == ZERO_INSTANT_SECS)
}
