use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use docforge_core::events::ProgressEvent;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/projects/{id}/events: SSE stream of progress events. The
/// retained backlog replays first, then live events follow. The SSE `id`
/// carries the per-project sequence number and the event name the kind, so
/// clients can resume ordering checks across reconnects.
pub async fn stream_events(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (backlog, rx) = app.orchestrator.subscribe(id).await?;

    let replay = tokio_stream::iter(backlog).map(to_sse);
    let live = BroadcastStream::new(rx).filter_map(|received| received.ok().map(to_sse));

    Ok(Sse::new(replay.chain(live)).keep_alive(KeepAlive::default()))
}

fn to_sse(event: ProgressEvent) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
    Ok(Event::default()
        .id(event.seq.to_string())
        .event(event.kind.as_str())
        .data(data))
}
