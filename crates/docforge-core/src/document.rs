//! Versioned document storage.
//!
//! One table keyed by a 29-byte composite:
//!
//! ```text
//! [ project uuid: 16 | kind code: 1 | epic: u32 big-endian: 4 | version: u64 big-endian: 8 ]
//! ```
//!
//! Epic 0 encodes the primary document; real epic numbers start at 1. All
//! versions of one series are contiguous under a shared 21-byte prefix, so
//! latest-version lookup and history listing are single range scans.
//!
//! Versions are dense and start at 1: [`DocumentStore::put_version`] assigns
//! max+1 inside its write transaction, and redb serializes writers, so the
//! sequence for a series never has holes or duplicates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{storage_err, DocforgeError, Result};
use crate::types::DocumentKind;

/// Key: 29-byte composite (see module docs). Value: JSON DocumentVersion.
const DOCUMENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("documents");

const KEY_LEN: usize = 29;
const PREFIX_LEN: usize = 21;

// ---------------------------------------------------------------------------
// DocumentKey
// ---------------------------------------------------------------------------

/// Addresses one logical document series within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub project_id: Uuid,
    pub kind: DocumentKind,
    /// `Some(n)` selects epic sub-document `n` (n >= 1), `None` the primary.
    pub epic: Option<u32>,
}

impl DocumentKey {
    pub fn primary(project_id: Uuid, kind: DocumentKind) -> Self {
        Self {
            project_id,
            kind,
            epic: None,
        }
    }

    pub fn epic(project_id: Uuid, kind: DocumentKind, epic: u32) -> Self {
        Self {
            project_id,
            kind,
            epic: Some(epic),
        }
    }

    fn validate(&self) -> Result<()> {
        match self.epic {
            Some(0) => Err(DocforgeError::InvalidEpicNumber(0)),
            Some(_) if !self.kind.supports_epics() => Err(DocforgeError::EpicOnPrimaryKind),
            _ => Ok(()),
        }
    }

    fn series_prefix(&self) -> [u8; PREFIX_LEN] {
        let mut prefix = [0u8; PREFIX_LEN];
        prefix[..16].copy_from_slice(self.project_id.as_bytes());
        prefix[16] = self.kind.code();
        prefix[17..].copy_from_slice(&self.epic.unwrap_or(0).to_be_bytes());
        prefix
    }

    fn version_key(&self, version: u64) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        key[..PREFIX_LEN].copy_from_slice(&self.series_prefix());
        key[PREFIX_LEN..].copy_from_slice(&version.to_be_bytes());
        key
    }

    /// Inclusive bounds covering every version of this series.
    fn series_bounds(&self) -> ([u8; KEY_LEN], [u8; KEY_LEN]) {
        (self.version_key(0), self.version_key(u64::MAX))
    }
}

// ---------------------------------------------------------------------------
// DocumentVersion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub project_id: Uuid,
    pub kind: DocumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic: Option<u32>,
    pub version: u64,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    /// Execution that produced this version.
    pub correlation_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

pub struct DocumentStore {
    db: Arc<Database>,
}

impl DocumentStore {
    /// Wrap the shared database, creating the table if needed.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let wt = db.begin_write().map_err(storage_err)?;
        wt.open_table(DOCUMENTS).map_err(storage_err)?;
        wt.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Append a new version to the series and return the stored row with
    /// its assigned version number.
    pub fn put_version(
        &self,
        key: DocumentKey,
        content: String,
        confidence_score: Option<f64>,
        correlation_id: Uuid,
    ) -> Result<DocumentVersion> {
        key.validate()?;
        let (low, high) = key.series_bounds();
        let wt = self.db.begin_write().map_err(storage_err)?;
        let stored = {
            let mut table = wt.open_table(DOCUMENTS).map_err(storage_err)?;
            let mut latest: u64 = 0;
            for entry in table
                .range(low.as_slice()..=high.as_slice())
                .map_err(storage_err)?
            {
                let (k, _) = entry.map_err(storage_err)?;
                latest = version_of(k.value());
            }

            let version = DocumentVersion {
                project_id: key.project_id,
                kind: key.kind,
                epic: key.epic,
                version: latest + 1,
                content,
                confidence_score,
                correlation_id,
                created_at: Utc::now(),
            };
            let value = serde_json::to_vec(&version).map_err(storage_err)?;
            table
                .insert(key.version_key(version.version).as_slice(), value.as_slice())
                .map_err(storage_err)?;
            version
        };
        wt.commit().map_err(storage_err)?;
        Ok(stored)
    }

    /// The highest version of the series, if any.
    pub fn get_latest(&self, key: DocumentKey) -> Result<Option<DocumentVersion>> {
        key.validate()?;
        let (low, high) = key.series_bounds();
        let rt = self.db.begin_read().map_err(storage_err)?;
        let table = rt.open_table(DOCUMENTS).map_err(storage_err)?;
        let mut latest = None;
        for entry in table
            .range(low.as_slice()..=high.as_slice())
            .map_err(storage_err)?
        {
            let (_, v) = entry.map_err(storage_err)?;
            latest = Some(serde_json::from_slice(v.value()).map_err(storage_err)?);
        }
        Ok(latest)
    }

    pub fn get_version(&self, key: DocumentKey, version: u64) -> Result<Option<DocumentVersion>> {
        key.validate()?;
        let rt = self.db.begin_read().map_err(storage_err)?;
        let table = rt.open_table(DOCUMENTS).map_err(storage_err)?;
        let Some(guard) = table
            .get(key.version_key(version).as_slice())
            .map_err(storage_err)?
        else {
            return Ok(None);
        };
        Ok(Some(
            serde_json::from_slice(guard.value()).map_err(storage_err)?,
        ))
    }

    /// All versions of the series, ascending from 1.
    pub fn list_versions(&self, key: DocumentKey) -> Result<Vec<DocumentVersion>> {
        key.validate()?;
        let (low, high) = key.series_bounds();
        let rt = self.db.begin_read().map_err(storage_err)?;
        let table = rt.open_table(DOCUMENTS).map_err(storage_err)?;
        let mut versions = Vec::new();
        for entry in table
            .range(low.as_slice()..=high.as_slice())
            .map_err(storage_err)?
        {
            let (_, v) = entry.map_err(storage_err)?;
            versions.push(serde_json::from_slice(v.value()).map_err(storage_err)?);
        }
        Ok(versions)
    }

    /// Distinct epic numbers that have at least one stored version,
    /// ascending.
    pub fn list_epics(&self, project_id: Uuid) -> Result<Vec<u32>> {
        let kind = DocumentKind::ImplementationPlan;
        let low = DocumentKey::epic(project_id, kind, 1).version_key(0);
        let high = DocumentKey::epic(project_id, kind, u32::MAX).version_key(u64::MAX);
        let rt = self.db.begin_read().map_err(storage_err)?;
        let table = rt.open_table(DOCUMENTS).map_err(storage_err)?;
        let mut epics: Vec<u32> = Vec::new();
        for entry in table
            .range(low.as_slice()..=high.as_slice())
            .map_err(storage_err)?
        {
            let (k, _) = entry.map_err(storage_err)?;
            let epic = epic_of(k.value());
            if epics.last() != Some(&epic) {
                epics.push(epic);
            }
        }
        Ok(epics)
    }
}

fn version_of(key: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[PREFIX_LEN..KEY_LEN]);
    u64::from_be_bytes(buf)
}

fn epic_of(key: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&key[17..PREFIX_LEN]);
    u32::from_be_bytes(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
