use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use docforge_core::execution::Execution;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/projects/{id}/executions: the project's ledger rows,
/// oldest first.
pub async fn list_executions(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Execution>>, AppError> {
    app.stores().projects.get(id)?;
    Ok(Json(app.stores().ledger.list_for_project(id)?))
}
