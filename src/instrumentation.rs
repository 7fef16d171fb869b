//! Per-request counters and latency histograms, exported in the Prometheus
//! text format at `GET /metrics/prometheus`.

use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

const LABELS: &[&str] = &["method", "path", "status_code"];

/// Request collectors registered on a registry owned by this value, never on
/// the process-wide default registry.
pub struct RequestMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
}

impl RequestMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "rolling_analytics_http_requests_total",
                "Total number of HTTP requests",
            ),
            LABELS,
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "rolling_analytics_http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            LABELS,
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
        })
    }

    /// Count one finished request and record how long it took.
    pub fn observe(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        let labels = [method, path, status.as_str()];

        self.requests_total.with_label_values(&labels).inc();
        self.request_duration
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
    }

    /// Render every collector in the text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_owned()
    }
}
