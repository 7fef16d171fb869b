//! Synthetic client traffic for exercising a running service: mostly metric
//! submissions around a steady baseline, with occasional analytics reads and
//! health checks.

pub mod collector;
pub mod percentiles;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cli::LoadgenOpts;
pub use collector::{LoadCollector, LoadReport};

// ─── Traffic profile ─────────────────────────────────────────────

const BASE_CPU: f64 = 30.0;
const CPU_NOISE: f64 = 5.0;
const MIN_CPU: f64 = 0.1;

const BASE_RPS: f64 = 50.0;
const RPS_NOISE: f64 = 10.0;
const MIN_RPS: f64 = 1.0;

/// Think time between two requests of one simulated client
const WAIT_MIN: Duration = Duration::from_millis(50);
const WAIT_MAX: Duration = Duration::from_millis(100);

/// What a simulated client does on each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    SubmitMetric,
    ReadAnalytics,
    HealthCheck,
}

impl Task {
    /// Relative pick frequency: 100 submissions per 2 reads per health check.
    const WEIGHTED: [(Task, u32); 3] = [
        (Task::SubmitMetric, 100),
        (Task::ReadAnalytics, 2),
        (Task::HealthCheck, 1),
    ];

    pub fn label(self) -> &'static str {
        match self {
            Task::SubmitMetric => "submit-metric",
            Task::ReadAnalytics => "read-analytics",
            Task::HealthCheck => "health-check",
        }
    }

    fn pick(rng: &mut impl Rng) -> Task {
        let total: u32 = Self::WEIGHTED.iter().map(|(_, w)| w).sum();
        let mut roll = rng.gen_range(0..total);
        for (task, weight) in Self::WEIGHTED {
            if roll < weight {
                return task;
            }
            roll -= weight;
        }
        Task::SubmitMetric
    }
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `opts.users` Tokio tasks that drive `opts.target` until the
/// deadline or Ctrl-C, then returns the collected report.
pub async fn run(opts: LoadgenOpts) -> Result<LoadReport, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let target = opts.target.trim_end_matches('/').to_owned();
    let deadline = Instant::now() + Duration::from_secs(opts.duration_secs);

    let running = Arc::new(AtomicBool::new(true));
    let collector = Arc::new(LoadCollector::new());

    {
        let running = running.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, stopping load generator");
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    info!(
        users = opts.users,
        duration_secs = opts.duration_secs,
        %target,
        "starting load generator"
    );

    let mut handles = Vec::with_capacity(opts.users as usize);
    for user_id in 0..opts.users {
        let user = SimulatedUser {
            client: client.clone(),
            target: target.clone(),
            collector: collector.clone(),
            running: running.clone(),
            rng: StdRng::seed_from_u64(user_seed(opts.seed, user_id)),
        };
        handles.push(tokio::spawn(user.run(deadline)));
    }

    for h in handles {
        let _ = h.await;
    }

    Ok(collector.report())
}

/// Per-user RNG seed. Wraps so any `--seed` is usable.
fn user_seed(base: u64, user_id: u32) -> u64 {
    base.wrapping_add(u64::from(user_id))
}

// ─── Worker loop ─────────────────────────────────────────────────

struct SimulatedUser {
    client: reqwest::Client,
    target: String,
    collector: Arc<LoadCollector>,
    running: Arc<AtomicBool>,
    rng: StdRng,
}

impl SimulatedUser {
    async fn run(mut self, deadline: Instant) {
        while self.running.load(Ordering::Relaxed) && Instant::now() < deadline {
            let wait = self.rng.gen_range(WAIT_MIN..=WAIT_MAX);
            tokio::time::sleep(wait).await;

            let task = Task::pick(&mut self.rng);
            let request = match task {
                Task::SubmitMetric => {
                    let body = synthetic_sample(&mut self.rng);
                    self.client
                        .post(format!("{}/metrics", self.target))
                        .json(&body)
                }
                Task::ReadAnalytics => self.client.get(format!("{}/analytics", self.target)),
                Task::HealthCheck => self.client.get(format!("{}/health", self.target)),
            };

            let t0 = Instant::now();
            let success = match request.send().await {
                Ok(resp) => resp.status().is_success(),
                Err(e) => {
                    warn!(task = task.label(), error = %e, "request failed");
                    false
                }
            };
            self.collector.record(task, t0.elapsed(), success);
        }
    }
}

/// A `POST /metrics` body jittered uniformly around the baseline.
fn synthetic_sample(rng: &mut impl Rng) -> serde_json::Value {
    let cpu = (BASE_CPU + rng.gen_range(-CPU_NOISE..=CPU_NOISE)).max(MIN_CPU);
    let rps = (BASE_RPS + rng.gen_range(-RPS_NOISE..=RPS_NOISE)).max(MIN_RPS);

    serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "cpu": cpu,
        "rps": rps,
    })
}
