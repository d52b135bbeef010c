use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use docforge_core::document::{DocumentKey, DocumentVersion};
use docforge_core::types::DocumentKind;
use docforge_core::DocforgeError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct DocumentParams {
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub epic: Option<u32>,
}

fn document_key(project_id: Uuid, kind: &str, epic: Option<u32>) -> Result<DocumentKey, AppError> {
    let kind: DocumentKind = kind.parse()?;
    Ok(match epic {
        Some(number) => DocumentKey::epic(project_id, kind, number),
        None => DocumentKey::primary(project_id, kind),
    })
}

/// GET /api/projects/{id}/documents/{kind}: latest version, or the one
/// named by `?version=`. `?epic=` selects an epic sub-document slot.
pub async fn get_document(
    State(app): State<AppState>,
    Path((id, kind)): Path<(Uuid, String)>,
    Query(params): Query<DocumentParams>,
) -> Result<Json<DocumentVersion>, AppError> {
    app.stores().projects.get(id)?;
    let key = document_key(id, &kind, params.epic)?;

    let found = match params.version {
        Some(version) => app.stores().documents.get_version(key, version)?,
        None => app.stores().documents.get_latest(key)?,
    };
    let document = found.ok_or_else(|| DocforgeError::DocumentNotFound {
        project_id: id,
        kind: kind.clone(),
    })?;
    Ok(Json(document))
}

/// GET /api/projects/{id}/documents/{kind}/versions: the full series,
/// version 1 upward.
pub async fn list_versions(
    State(app): State<AppState>,
    Path((id, kind)): Path<(Uuid, String)>,
    Query(params): Query<DocumentParams>,
) -> Result<Json<Vec<DocumentVersion>>, AppError> {
    app.stores().projects.get(id)?;
    let key = document_key(id, &kind, params.epic)?;
    Ok(Json(app.stores().documents.list_versions(key)?))
}

/// GET /api/projects/{id}/epics: the newest version of every epic
/// sub-document of the implementation plan.
pub async fn list_epics(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentVersion>>, AppError> {
    app.stores().projects.get(id)?;
    let mut result = Vec::new();
    for number in app.stores().documents.list_epics(id)? {
        let key = DocumentKey::epic(id, DocumentKind::ImplementationPlan, number);
        if let Some(doc) = app.stores().documents.get_latest(key)? {
            result.push(doc);
        }
    }
    Ok(Json(result))
}
