use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use super::WindowSnapshot;
use crate::AppState;

/// Dashboard refresh period for the SSE feed.
const STREAM_INTERVAL: Duration = Duration::from_millis(500);

// ─── GET /analytics ──────────────────────────────────────────────
/// Current window length, rolling average and lifetime sample count.

pub async fn get_analytics(State(state): State<Arc<AppState>>) -> Json<WindowSnapshot> {
    Json(state.window.snapshot())
}

// ─── GET /analytics/stream ───────────────────────────────────────
/// Server-Sent Events endpoint.
/// Sends the same object as `GET /analytics` on connect, then again on any
/// 500 ms tick where new samples have arrived. Idle periods are covered by
/// the keep-alive comment.

pub async fn analytics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(STREAM_INTERVAL);

    let mut last_sent: Option<u64> = None;

    let stream = IntervalStream::new(interval).filter_map(move |_| {
        let snapshot = state.window.snapshot();
        if last_sent == Some(snapshot.total_count) {
            return None;
        }
        last_sent = Some(snapshot.total_count);
        Some(Ok::<_, Infallible>(snapshot_event(&snapshot)))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn snapshot_event(snapshot: &WindowSnapshot) -> Event {
    let json = serde_json::to_string(snapshot).unwrap_or_default();
    Event::default().event("analytics").data(json)
}
