use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::AppState;

/// `path` label for requests that hit the 404 fallback.
pub const UNMATCHED_PATH: &str = "unmatched";

/// Wraps every request (matched routes and the fallback alike):
///
///   * reports (method, route template, status, elapsed) to the request
///     counter and duration histogram
///   * logs a warning for requests slower than the configured threshold
///
/// Unmatched requests have no route template and all share the
/// [`UNMATCHED_PATH`] label, so arbitrary URIs cannot grow the registry.
pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => UNMATCHED_PATH.to_owned(),
    };

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();

    let status = response.status().as_u16();
    state
        .requests
        .observe(method.as_str(), &path, status, elapsed);

    if elapsed > state.slow_request_threshold {
        warn!(
            %method,
            %path,
            status,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "slow request"
        );
    }

    response
}
