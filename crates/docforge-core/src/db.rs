//! Shared redb database handle.
//!
//! All stores live in one database file so a process holds a single writer
//! lock and each store's write transactions serialize against the others.
//! Tables are created by each store's constructor before any reads.

use crate::document::DocumentStore;
use crate::error::{storage_err, Result};
use crate::ledger::ExecutionLedger;
use crate::project::ProjectStore;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

/// Open (or create) the database file at `path`.
pub fn open_database(path: &Path) -> Result<Arc<Database>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::create(path).map_err(storage_err)?;
    Ok(Arc::new(db))
}

/// The three persistent stores, sharing one database.
#[derive(Clone)]
pub struct Stores {
    pub projects: Arc<ProjectStore>,
    pub ledger: Arc<ExecutionLedger>,
    pub documents: Arc<DocumentStore>,
}

impl Stores {
    pub fn open(path: &Path) -> Result<Self> {
        let db = open_database(path)?;
        Ok(Self {
            projects: Arc::new(ProjectStore::new(Arc::clone(&db))?),
            ledger: Arc::new(ExecutionLedger::new(Arc::clone(&db))?),
            documents: Arc::new(DocumentStore::new(db)?),
        })
    }
}
