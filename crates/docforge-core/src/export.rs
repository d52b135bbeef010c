//! Export eligibility.
//!
//! Packaging itself happens outside this crate; here we only answer
//! whether a project has finished its workflow with a complete document
//! set, and what the package would contain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{DocumentKey, DocumentStore};
use crate::error::Result;
use crate::project::Project;
use crate::types::{DocumentKind, ProjectStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEntry {
    pub kind: DocumentKind,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub project_id: Uuid,
    pub status: ProjectStatus,
    /// True once the workflow has completed and every stage's primary
    /// document has at least one version.
    pub eligible: bool,
    pub missing: Vec<DocumentKind>,
    pub documents: Vec<ExportEntry>,
    pub epics: Vec<u32>,
}

pub fn report(project: &Project, documents: &DocumentStore) -> Result<ExportReport> {
    let mut missing = Vec::new();
    let mut entries = Vec::new();
    for kind in DocumentKind::all() {
        match documents.get_latest(DocumentKey::primary(project.id, *kind))? {
            Some(latest) => entries.push(ExportEntry {
                kind: *kind,
                version: latest.version,
                updated_at: latest.created_at,
            }),
            None => missing.push(*kind),
        }
    }
    let epics = documents.list_epics(project.id)?;
    Ok(ExportReport {
        project_id: project.id,
        status: project.status,
        eligible: project.status == ProjectStatus::Completed && missing.is_empty(),
        missing,
        documents: entries,
        epics,
    })
}
