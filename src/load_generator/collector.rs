use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use super::percentiles::PercentileSet;
use super::Task;

// ─── Configuration ───────────────────────────────────────────────

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe tally of load-generator requests.
/// Workers call `record()`, the final report calls `report()`.
pub struct LoadCollector {
    inner: Mutex<Inner>,
}

/// Per-task outcome of a finished run.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: Task,
    pub errors: u64,
    pub latency_us: PercentileSet,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub elapsed: Duration,
    pub tasks: Vec<TaskReport>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    by_task: BTreeMap<Task, TaskTally>,
    start_time: Instant,
}

struct TaskTally {
    latency: Histogram<u64>,
    errors: u64,
}

// ─── LoadCollector impl ──────────────────────────────────────────

impl LoadCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_task: BTreeMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    /// Record one request. `success` is false for transport errors and
    /// non-2xx responses.
    pub fn record(&self, task: Task, elapsed: Duration, success: bool) {
        let us = (elapsed.as_micros() as u64).clamp(HIST_LOW, HIST_HIGH);

        let mut inner = self.inner.lock();
        let tally = inner.by_task.entry(task).or_insert_with(TaskTally::new);
        let _ = tally.latency.record(us);
        if !success {
            tally.errors += 1;
        }
    }

    pub fn report(&self) -> LoadReport {
        let inner = self.inner.lock();
        LoadReport {
            elapsed: inner.start_time.elapsed(),
            tasks: inner
                .by_task
                .iter()
                .map(|(task, tally)| TaskReport {
                    task: *task,
                    errors: tally.errors,
                    latency_us: PercentileSet::from_histogram(&tally.latency),
                })
                .collect(),
        }
    }
}

impl TaskTally {
    fn new() -> Self {
        Self {
            // bounds are constants inside hdrhistogram's supported range
            latency: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
            errors: 0,
        }
    }
}

// ─── LoadReport impl ─────────────────────────────────────────────

impl LoadReport {
    pub fn total_requests(&self) -> u64 {
        self.tasks.iter().map(|t| t.latency_us.count).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.tasks.iter().map(|t| t.errors).sum()
    }

    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_requests() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>8} {:>7} {:>8} {:>9} {:>8} {:>8} {:>8} {:>8} {:>9}",
            "task", "count", "errors", "min", "mean", "p50", "p95", "p99", "p99.9", "max"
        )?;
        for t in &self.tasks {
            let l = &t.latency_us;
            writeln!(
                f,
                "{:<16} {:>8} {:>7} {:>8} {:>9.0} {:>8} {:>8} {:>8} {:>8} {:>9}",
                t.task.label(),
                l.count,
                t.errors,
                l.min,
                l.mean,
                l.p50,
                l.p95,
                l.p99,
                l.p999,
                l.max
            )?;
        }
        write!(
            f,
            "{} requests, {} errors in {:.1}s ({:.1} req/s), latencies in μs",
            self.total_requests(),
            self.total_errors(),
            self.elapsed.as_secs_f64(),
            self.requests_per_sec()
        )
    }
}
