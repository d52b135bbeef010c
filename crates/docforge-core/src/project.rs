use crate::error::{storage_err, DocforgeError, Result};
use crate::types::{ProjectStatus, Stage};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Key: project uuid (16 bytes). Value: JSON-encoded Project.
const PROJECTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("projects");

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A tenant-scoped documentation workflow. Only the orchestrator mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    /// 1-based pointer to the stage the workflow is at. Never decreases
    /// while processing.
    pub current_step: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(tenant_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            status: ProjectStatus::Draft,
            current_step: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_stage(&self) -> Result<Stage> {
        Stage::from_number(self.current_step)
    }
}

// ---------------------------------------------------------------------------
// ProjectStore
// ---------------------------------------------------------------------------

pub struct ProjectStore {
    db: Arc<Database>,
}

impl ProjectStore {
    /// Wrap the shared database, creating the table if needed.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let wt = db.begin_write().map_err(storage_err)?;
        wt.open_table(PROJECTS).map_err(storage_err)?;
        wt.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    pub fn create(&self, project: &Project) -> Result<()> {
        let value = serde_json::to_vec(project).map_err(storage_err)?;
        let wt = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = wt.open_table(PROJECTS).map_err(storage_err)?;
            table
                .insert(project.id.as_bytes().as_slice(), value.as_slice())
                .map_err(storage_err)?;
        }
        wt.commit().map_err(storage_err)?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Project> {
        let rt = self.db.begin_read().map_err(storage_err)?;
        let table = rt.open_table(PROJECTS).map_err(storage_err)?;
        let guard = table
            .get(id.as_bytes().as_slice())
            .map_err(storage_err)?
            .ok_or(DocforgeError::ProjectNotFound(id))?;
        let project: Project = serde_json::from_slice(guard.value()).map_err(storage_err)?;
        Ok(project)
    }

    /// Read-modify-write in one transaction. Bumps `updated_at`.
    pub fn update<F>(&self, id: Uuid, mutate: F) -> Result<Project>
    where
        F: FnOnce(&mut Project),
    {
        let wt = self.db.begin_write().map_err(storage_err)?;
        let project = {
            let mut table = wt.open_table(PROJECTS).map_err(storage_err)?;
            let bytes = {
                let guard = table
                    .get(id.as_bytes().as_slice())
                    .map_err(storage_err)?
                    .ok_or(DocforgeError::ProjectNotFound(id))?;
                guard.value().to_vec()
            };
            let mut project: Project = serde_json::from_slice(&bytes).map_err(storage_err)?;
            mutate(&mut project);
            project.updated_at = Utc::now();
            let value = serde_json::to_vec(&project).map_err(storage_err)?;
            table
                .insert(id.as_bytes().as_slice(), value.as_slice())
                .map_err(storage_err)?;
            project
        };
        wt.commit().map_err(storage_err)?;
        Ok(project)
    }

    /// All projects, newest first, optionally filtered by tenant.
    pub fn list(&self, tenant_id: Option<Uuid>) -> Result<Vec<Project>> {
        let rt = self.db.begin_read().map_err(storage_err)?;
        let table = rt.open_table(PROJECTS).map_err(storage_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (_, v) = entry.map_err(storage_err)?;
            let project: Project = serde_json::from_slice(v.value()).map_err(storage_err)?;
            if tenant_id.map_or(true, |t| project.tenant_id == t) {
                result.push(project);
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_database;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, ProjectStore) {
        let dir = TempDir::new().unwrap();
        let db = open_database(&dir.path().join("test.redb")).unwrap();
        (dir, ProjectStore::new(db).unwrap())
    }

    #[test]
    fn create_and_get() {
        let (_dir, store) = open_tmp();
        let project = Project::new(Uuid::new_v4(), "billing-platform");
        store.create(&project).unwrap();
        let loaded = store.get(project.id).unwrap();
        assert_eq!(loaded.name, "billing-platform");
        assert_eq!(loaded.status, ProjectStatus::Draft);
        assert_eq!(loaded.current_step, 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, store) = open_tmp();
        match store.get(Uuid::new_v4()) {
            Err(DocforgeError::ProjectNotFound(_)) => {}
            other => panic!("expected ProjectNotFound, got {other:?}"),
        }
    }

    #[test]
    fn update_mutates_and_bumps_updated_at() {
        let (_dir, store) = open_tmp();
        let project = Project::new(Uuid::new_v4(), "crm");
        store.create(&project).unwrap();
        let before = store.get(project.id).unwrap().updated_at;
        let updated = store
            .update(project.id, |p| {
                p.status = ProjectStatus::Processing;
                p.current_step = 2;
            })
            .unwrap();
        assert_eq!(updated.status, ProjectStatus::Processing);
        assert_eq!(updated.current_step, 2);
        assert!(updated.updated_at >= before);
    }

    #[test]
    fn update_missing_is_not_found() {
        let (_dir, store) = open_tmp();
        let err = store.update(Uuid::new_v4(), |_| {}).unwrap_err();
        assert!(matches!(err, DocforgeError::ProjectNotFound(_)));
    }

    #[test]
    fn list_filters_by_tenant_newest_first() {
        let (_dir, store) = open_tmp();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let mut first = Project::new(tenant_a, "first");
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        store.create(&first).unwrap();
        store.create(&Project::new(tenant_a, "second")).unwrap();
        store.create(&Project::new(tenant_b, "other")).unwrap();

        let all = store.list(None).unwrap();
        assert_eq!(all.len(), 3);

        let for_a = store.list(Some(tenant_a)).unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].name, "second");
        assert_eq!(for_a[1].name, "first");
    }
}
