use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::analytics::stream;
use crate::handlers;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Ingestion ───────────────────────────────────────────
        .route("/metrics", post(handlers::metrics::submit_metric))
        // ── Analytics ───────────────────────────────────────────
        .route("/analytics", get(stream::get_analytics))
        .route("/analytics/stream", get(stream::analytics_stream))
        // ── Operations ──────────────────────────────────────────
        .route("/health", get(handlers::health::health_check))
        .route(
            "/metrics/prometheus",
            get(handlers::metrics::prometheus_metrics),
        )
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            timing::track_requests,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveStore;
    use crate::testing::{app_state, ArchiveMode, FakeArchive};
    use axum::body::{self, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::time::Duration;
    use tokio_stream::StreamExt;
    use tower::ServiceExt; // for `oneshot`

    fn app(capacity: usize, mode: ArchiveMode) -> (Router, Arc<AppState>) {
        let (store, _writes) = FakeArchive::new(mode);
        let state = app_state(capacity, store as Arc<dyn ArchiveStore>);
        (create_router(state.clone()), state)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn post_metric(app: &Router, payload: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/metrics")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_owned()))
            .unwrap();
        let (status, body) = send(app, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(app, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn three_samples_average_to_twenty() {
        let (app, _) = app(50, ArchiveMode::Healthy);
        for rps in [10, 20, 30] {
            let (status, _) = post_metric(&app, &format!(r#"{{"cpu":50,"rps":{rps}}}"#)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = get_json(&app, "/analytics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "window_size": 3,
                "rolling_average": 20.0,
                "total_metrics": 3,
            })
        );
    }

    #[tokio::test]
    async fn window_of_two_keeps_last_pair() {
        let (app, _) = app(2, ArchiveMode::Healthy);
        for rps in [1, 2, 3] {
            post_metric(&app, &format!(r#"{{"cpu":5,"rps":{rps}}}"#)).await;
        }

        let (_, body) = get_json(&app, "/analytics").await;
        assert_eq!(body["window_size"], 2);
        assert_eq!(body["rolling_average"], 2.5);
        assert_eq!(body["total_metrics"], 3);
    }

    #[tokio::test]
    async fn submit_echoes_sample_and_average() {
        let (app, _) = app(50, ArchiveMode::Healthy);
        let (status, body) = post_metric(
            &app,
            r#"{"timestamp":"2024-05-01T12:00:00Z","cpu":33.5,"rps":41}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "status": "processed",
                "rps": 41.0,
                "cpu": 33.5,
                "avg_rps": 41.0,
                "timestamp": "2024-05-01T12:00:00Z",
            })
        );
    }

    #[tokio::test]
    async fn malformed_body_is_400_and_not_counted() {
        let (app, state) = app(50, ArchiveMode::Healthy);
        for payload in [r#"{"cpu":10}"#, r#"{"cpu":"x","rps":1}"#, "{{{"] {
            let (status, body) = post_metric_raw(&app, payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
            assert!(body["error"].as_str().is_some_and(|m| !m.is_empty()));
        }
        assert_eq!(state.window.snapshot().total_count, 0);
    }

    async fn post_metric_raw(app: &Router, payload: &str) -> (StatusCode, Value) {
        // no content-type header on purpose
        let req = Request::builder()
            .method("POST")
            .uri("/metrics")
            .body(Body::from(payload.to_owned()))
            .unwrap();
        let (status, body) = send(app, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn archive_outage_does_not_fail_ingestion() {
        let (app, _) = app(50, ArchiveMode::Failing);
        let (status, body) = post_metric(&app, r#"{"cpu":1,"rps":9}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["avg_rps"], 9.0);

        let (_, analytics) = get_json(&app, "/analytics").await;
        assert_eq!(analytics["total_metrics"], 1);
    }

    #[tokio::test]
    async fn health_reflects_archive_reachability() {
        let (healthy, _) = app(50, ArchiveMode::Healthy);
        let (status, body) = get_json(&healthy, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "healthy" }));

        let (down, _) = app(50, ArchiveMode::Failing);
        let (status, body) = get_json(&down, "/health").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "unhealthy");
        assert!(body["error"].as_str().unwrap().contains("connection refused"));

        let (hung, _) = app(50, ArchiveMode::Hanging);
        let (status, _) = get_json(&hung, "/health").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn requests_are_instrumented_by_route_and_status() {
        let (app, _) = app(50, ArchiveMode::Healthy);
        post_metric(&app, r#"{"cpu":1,"rps":2}"#).await;
        post_metric_raw(&app, "nope").await;
        get_json(&app, "/analytics").await;
        for uri in ["/missing", "/scan/1", "/scan/2?q=x"] {
            let (status, _) = send(
                &app,
                Request::builder().uri(uri).body(Body::empty()).unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }

        let req = Request::builder()
            .uri("/metrics/prometheus")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_owned();
        assert!(content_type.starts_with("text/plain"));

        let body = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("rolling_analytics_http_requests_total"));
        assert!(text.contains("rolling_analytics_http_request_duration_seconds"));
        assert!(text.contains(r#"path="/metrics""#));
        assert!(text.contains(r#"status_code="400""#));
        assert!(text.contains(r#"path="/analytics""#));
        assert!(text.contains(r#"status_code="404""#));

        // all unmatched URIs collapse into one series
        assert!(!text.contains("/missing"), "{text}");
        assert!(!text.contains("/scan"), "{text}");
        let unmatched: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("rolling_analytics_http_requests_total{"))
            .filter(|l| l.contains(r#"path="unmatched""#))
            .collect();
        assert_eq!(unmatched.len(), 1, "{unmatched:?}");
        assert!(unmatched[0].ends_with(" 3"), "{unmatched:?}");
    }

    #[tokio::test]
    async fn stream_sends_current_snapshot_on_connect() {
        let (app, _) = app(50, ArchiveMode::Healthy);
        post_metric(&app, r#"{"cpu":1,"rps":6}"#).await;

        let req = Request::builder()
            .uri("/analytics/stream")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let mut chunks = resp.into_body().into_data_stream();
        let first = tokio::time::timeout(Duration::from_secs(2), chunks.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(first.to_vec()).unwrap();
        assert!(text.contains("event: analytics"), "{text}");
        assert!(text.contains(r#""total_metrics":1"#), "{text}");
        assert!(text.contains(r#""rolling_average":6.0"#), "{text}");
    }

    #[tokio::test]
    async fn idle_stream_sends_nothing_until_new_sample() {
        let (app, _) = app(50, ArchiveMode::Healthy);
        post_metric(&app, r#"{"cpu":1,"rps":6}"#).await;

        let req = Request::builder()
            .uri("/analytics/stream")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let mut chunks = resp.into_body().into_data_stream();

        let first = tokio::time::timeout(Duration::from_secs(2), chunks.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(String::from_utf8(first.to_vec()).unwrap().contains(r#""total_metrics":1"#));

        // several ticks pass with no new samples
        let idle = tokio::time::timeout(Duration::from_millis(1_200), chunks.next()).await;
        assert!(idle.is_err(), "unexpected event on idle window: {idle:?}");

        post_metric(&app, r#"{"cpu":1,"rps":8}"#).await;
        let next = tokio::time::timeout(Duration::from_secs(2), chunks.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(next.to_vec()).unwrap();
        assert!(text.contains("event: analytics"), "{text}");
        assert!(text.contains(r#""total_metrics":2"#), "{text}");
        assert!(text.contains(r#""rolling_average":7.0"#), "{text}");
    }
}
