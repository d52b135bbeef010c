use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use docforge_core::export;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/projects/{id}/export: whether the workflow is complete enough
/// to hand to a packager, with the inventory the archive would cover.
pub async fn export_report(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let project = app.stores().projects.get(id)?;
    let report = export::report(&project, &app.stores().documents)?;

    let mut body = serde_json::to_value(&report)?;
    if !report.eligible {
        let reason = if report.missing.is_empty() {
            format!("project status is {}", report.status)
        } else {
            let missing: Vec<&str> = report.missing.iter().map(|k| k.as_str()).collect();
            format!("missing documents: {}", missing.join(", "))
        };
        body["reason"] = serde_json::json!(reason);
    }
    Ok(Json(body))
}
