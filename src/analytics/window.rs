use std::collections::VecDeque;
use std::num::NonZeroUsize;

use parking_lot::RwLock;
use serde::Serialize;

use super::Sample;

// ─── Configuration ───────────────────────────────────────────────

/// How many samples the rolling window holds unless configured otherwise.
pub const DEFAULT_WINDOW_SIZE: NonZeroUsize = match NonZeroUsize::new(50) {
    Some(n) => n,
    None => panic!("window size must be non-zero"),
};

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe sliding window over the most recent samples.
/// Ingestion calls `add()`, analytics readers call `snapshot()`.
pub struct WindowAggregator {
    capacity: NonZeroUsize,
    inner: RwLock<Window>,
}

/// Point-in-time view of the window, served as `GET /analytics`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowSnapshot {
    #[serde(rename = "window_size")]
    pub window_len: usize,
    pub rolling_average: f64,
    #[serde(rename = "total_metrics")]
    pub total_count: u64,
}

// ─── Internal state ──────────────────────────────────────────────

struct Window {
    // Oldest sample at the front
    samples: VecDeque<Sample>,

    // Mean rps over `samples`, kept in step with every push
    rolling_average: f64,

    // Every sample ever accepted, evicted or not
    total_count: u64,
}

// ─── WindowAggregator impl ───────────────────────────────────────

impl WindowAggregator {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Window::new(capacity.get())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Append a sample, evicting the oldest one when the window is full,
    /// and return the new rolling average.
    ///
    /// Values are taken as-is: negative or NaN rps flow straight into the
    /// average.
    pub fn add(&self, sample: Sample) -> f64 {
        self.inner.write().push(sample, self.capacity.get())
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        self.inner.read().snapshot()
    }
}

// ─── Window impl ─────────────────────────────────────────────────

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            rolling_average: 0.0,
            total_count: 0,
        }
    }

    fn push(&mut self, sample: Sample, capacity: usize) -> f64 {
        self.total_count += 1;

        if self.samples.len() == capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);

        self.recompute_average();
        self.rolling_average
    }

    /// Full re-summation over the window. O(capacity), but the result never
    /// drifts from the plain mean of what is currently held.
    fn recompute_average(&mut self) {
        let n = self.samples.len();
        if n == 0 {
            self.rolling_average = 0.0;
            return;
        }

        let sum: f64 = self.samples.iter().map(|s| s.rps).sum();
        self.rolling_average = sum / n as f64;
    }

    fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            window_len: self.samples.len(),
            rolling_average: self.rolling_average,
            total_count: self.total_count,
        }
    }
}
