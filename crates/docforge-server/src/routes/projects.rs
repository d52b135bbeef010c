use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use docforge_core::project::Project;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProjectBody {
    pub tenant_id: Uuid,
    pub name: String,
}

/// POST /api/projects: register a new documentation workflow.
pub async fn create_project(
    State(app): State<AppState>,
    Json(body): Json<CreateProjectBody>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = Project::new(body.tenant_id, body.name);
    app.stores().projects.create(&project)?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[derive(Deserialize, Default)]
pub struct ListParams {
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

/// GET /api/projects: all projects, optionally scoped to one tenant.
pub async fn list_projects(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(app.stores().projects.list(params.tenant_id)?))
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(app.stores().projects.get(id)?))
}

/// GET /api/projects/{id}/progress: the workflow pointer plus a
/// stage-by-stage breakdown.
pub async fn get_progress(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let progress = app.orchestrator.get_progress(id).await?;
    let last_execution = app.stores().ledger.latest_for_project(id)?;
    Ok(Json(serde_json::json!({
        "project": progress.project,
        "current_step": progress.project.current_step,
        "status": progress.project.status,
        "active": progress.active,
        "last_execution": last_execution,
        "stages": progress.stages,
    })))
}
