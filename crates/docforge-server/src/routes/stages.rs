use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct StartStageBody {
    /// Free-form payload recorded on the execution and forwarded to
    /// generation.
    #[serde(default)]
    pub input: Option<serde_json::Value>,
}

/// POST /api/projects/{id}/stages/{stage}/start: dispatch a stage run.
/// Answers 409 `CONCURRENT_EXECUTION` while another run is active and 422
/// `INVALID_STAGE_ORDER` when the stage is not startable yet.
pub async fn start_stage(
    State(app): State<AppState>,
    Path((id, stage)): Path<(Uuid, u8)>,
    body: Option<Json<StartStageBody>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let input = body.and_then(|Json(b)| b.input);
    let correlation_id = app.orchestrator.start_stage(id, stage, input).await?;
    Ok(Json(serde_json::json!({ "correlation_id": correlation_id })))
}

/// POST /api/projects/{id}/cancel: stop whatever is active. Idempotent:
/// cancelling an idle project reports `cancelled: false`.
pub async fn cancel_stage(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = app.orchestrator.cancel_stage(id).await?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "cancelled": outcome.cancelled,
        "correlation_id": outcome.correlation_id,
    })))
}
