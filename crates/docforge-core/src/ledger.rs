//! Durable audit log of generation attempts.
//!
//! # Table design
//!
//! `executions` is keyed by correlation uuid. `active_executions` maps a
//! project uuid to the correlation uuid of its one in-flight execution; the
//! conditional insert into this table inside [`ExecutionLedger::record`] IS
//! the project execution lock: redb write transactions are serializable, so
//! two concurrent `record` calls for the same project cannot both pass the
//! presence check. `execution_history` uses a 40-byte composite key:
//!
//! ```text
//! [ project uuid: 16 | started_at_ms: u64 big-endian: 8 | correlation uuid: 16 ]
//! ```
//!
//! Big-endian timestamps make byte order equal start order, so a single
//! range scan under a project prefix lists that project's attempts
//! oldest-first without post-sorting.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::error::{storage_err, DocforgeError, Result};
use crate::execution::{Execution, ExecutionStatus, TransitionUpdate};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Key: correlation uuid (16 bytes). Value: JSON-encoded Execution.
const EXECUTIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("executions");
/// Key: project uuid (16 bytes). Value: correlation uuid of the active row.
const ACTIVE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("active_executions");
/// Key: 40-byte composite (project ++ started_at_ms ++ correlation).
/// Value: correlation uuid.
const HISTORY: TableDefinition<&[u8], &[u8]> = TableDefinition::new("execution_history");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn history_key(project_id: Uuid, started_at: DateTime<Utc>, correlation_id: Uuid) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..16].copy_from_slice(project_id.as_bytes());
    let ms = started_at.timestamp_millis().max(0) as u64;
    key[16..24].copy_from_slice(&ms.to_be_bytes());
    key[24..].copy_from_slice(correlation_id.as_bytes());
    key
}

/// Inclusive bounds covering every history entry of one project.
fn history_bounds(project_id: Uuid) -> ([u8; 40], [u8; 40]) {
    let mut low = [0u8; 40];
    low[..16].copy_from_slice(project_id.as_bytes());
    let mut high = [0xffu8; 40];
    high[..16].copy_from_slice(project_id.as_bytes());
    (low, high)
}

// ---------------------------------------------------------------------------
// ExecutionLedger
// ---------------------------------------------------------------------------

pub struct ExecutionLedger {
    db: Arc<Database>,
}

impl ExecutionLedger {
    /// Wrap the shared database, creating the tables if needed.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let wt = db.begin_write().map_err(storage_err)?;
        wt.open_table(EXECUTIONS).map_err(storage_err)?;
        wt.open_table(ACTIVE).map_err(storage_err)?;
        wt.open_table(HISTORY).map_err(storage_err)?;
        wt.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Record a new pending execution, acquiring the project's execution
    /// lock in the same transaction.
    ///
    /// Fails with [`DocforgeError::ConcurrentExecution`] when the project
    /// already has an active row; nothing is written in that case.
    pub fn record(&self, execution: &Execution) -> Result<()> {
        debug_assert!(execution.status.is_active());
        let value = serde_json::to_vec(execution).map_err(storage_err)?;
        let wt = self.db.begin_write().map_err(storage_err)?;
        {
            let mut active = wt.open_table(ACTIVE).map_err(storage_err)?;
            let held = active
                .get(execution.project_id.as_bytes().as_slice())
                .map_err(storage_err)?
                .is_some();
            if held {
                // Dropping the uncommitted transaction rolls everything back.
                return Err(DocforgeError::ConcurrentExecution {
                    project_id: execution.project_id,
                });
            }
            active
                .insert(
                    execution.project_id.as_bytes().as_slice(),
                    execution.correlation_id.as_bytes().as_slice(),
                )
                .map_err(storage_err)?;

            let mut executions = wt.open_table(EXECUTIONS).map_err(storage_err)?;
            executions
                .insert(
                    execution.correlation_id.as_bytes().as_slice(),
                    value.as_slice(),
                )
                .map_err(storage_err)?;

            let mut history = wt.open_table(HISTORY).map_err(storage_err)?;
            let hkey = history_key(
                execution.project_id,
                execution.started_at,
                execution.correlation_id,
            );
            history
                .insert(
                    hkey.as_slice(),
                    execution.correlation_id.as_bytes().as_slice(),
                )
                .map_err(storage_err)?;
        }
        wt.commit().map_err(storage_err)?;
        Ok(())
    }

    /// Apply a status change plus its payload.
    ///
    /// Fails with [`DocforgeError::InvalidTransition`] on any move out of a
    /// terminal state or one that skips `running` (see
    /// [`ExecutionStatus::allowed_transitions`]). A terminal transition
    /// releases the project's lock marker in the same transaction.
    pub fn transition(&self, correlation_id: Uuid, update: TransitionUpdate) -> Result<Execution> {
        let now = Utc::now();
        let wt = self.db.begin_write().map_err(storage_err)?;
        let updated = {
            let mut executions = wt.open_table(EXECUTIONS).map_err(storage_err)?;
            let bytes = {
                let guard = executions
                    .get(correlation_id.as_bytes().as_slice())
                    .map_err(storage_err)?
                    .ok_or(DocforgeError::ExecutionNotFound(correlation_id))?;
                guard.value().to_vec()
            };
            let mut execution: Execution =
                serde_json::from_slice(&bytes).map_err(storage_err)?;

            if !execution.status.can_transition_to(update.status) {
                return Err(DocforgeError::InvalidTransition {
                    correlation_id,
                    from: execution.status.to_string(),
                    to: update.status.to_string(),
                });
            }

            execution.status = update.status;
            if let Some(attempts) = update.attempts {
                execution.attempts = attempts;
            }
            if let Some(output) = update.output {
                execution.output = Some(output);
            }
            if let Some(message) = update.error_message {
                execution.error_message = Some(message);
            }
            execution.updated_at = now;
            if update.status.is_terminal() {
                execution.completed_at = Some(now);
            }

            let value = serde_json::to_vec(&execution).map_err(storage_err)?;
            executions
                .insert(correlation_id.as_bytes().as_slice(), value.as_slice())
                .map_err(storage_err)?;

            if update.status.is_terminal() {
                release_marker(&wt, execution.project_id, correlation_id)?;
            }
            execution
        };
        wt.commit().map_err(storage_err)?;
        Ok(updated)
    }

    /// Bump the attempt counter on an active row without a status change.
    ///
    /// Refreshes `updated_at`, which is also the liveness heartbeat that
    /// [`ExecutionLedger::recover_stale`] keys off. Fails with
    /// [`DocforgeError::InvalidTransition`] when the row is already
    /// terminal, which tells a worker the execution was cancelled out from
    /// under it.
    pub fn touch_attempt(&self, correlation_id: Uuid, attempts: u32) -> Result<Execution> {
        let wt = self.db.begin_write().map_err(storage_err)?;
        let updated = {
            let mut executions = wt.open_table(EXECUTIONS).map_err(storage_err)?;
            let bytes = {
                let guard = executions
                    .get(correlation_id.as_bytes().as_slice())
                    .map_err(storage_err)?
                    .ok_or(DocforgeError::ExecutionNotFound(correlation_id))?;
                guard.value().to_vec()
            };
            let mut execution: Execution =
                serde_json::from_slice(&bytes).map_err(storage_err)?;
            if execution.status.is_terminal() {
                return Err(DocforgeError::InvalidTransition {
                    correlation_id,
                    from: execution.status.to_string(),
                    to: ExecutionStatus::Running.to_string(),
                });
            }
            execution.attempts = attempts;
            execution.updated_at = Utc::now();
            let value = serde_json::to_vec(&execution).map_err(storage_err)?;
            executions
                .insert(correlation_id.as_bytes().as_slice(), value.as_slice())
                .map_err(storage_err)?;
            execution
        };
        wt.commit().map_err(storage_err)?;
        Ok(updated)
    }

    /// The project's active execution, if any. Strongly consistent: reads
    /// the committed marker written by [`ExecutionLedger::record`].
    pub fn find_active(&self, project_id: Uuid) -> Result<Option<Execution>> {
        let rt = self.db.begin_read().map_err(storage_err)?;
        let active = rt.open_table(ACTIVE).map_err(storage_err)?;
        let correlation = {
            match active
                .get(project_id.as_bytes().as_slice())
                .map_err(storage_err)?
            {
                Some(guard) => Uuid::from_slice(guard.value()).map_err(storage_err)?,
                None => return Ok(None),
            }
        };
        let executions = rt.open_table(EXECUTIONS).map_err(storage_err)?;
        let guard = executions
            .get(correlation.as_bytes().as_slice())
            .map_err(storage_err)?
            .ok_or_else(|| {
                DocforgeError::Storage(format!(
                    "active marker for project {project_id} points at missing \
                     execution {correlation}"
                ))
            })?;
        let execution: Execution = serde_json::from_slice(guard.value()).map_err(storage_err)?;
        Ok(Some(execution))
    }

    pub fn find_by_correlation(&self, correlation_id: Uuid) -> Result<Option<Execution>> {
        let rt = self.db.begin_read().map_err(storage_err)?;
        let executions = rt.open_table(EXECUTIONS).map_err(storage_err)?;
        let Some(guard) = executions
            .get(correlation_id.as_bytes().as_slice())
            .map_err(storage_err)?
        else {
            return Ok(None);
        };
        let execution: Execution = serde_json::from_slice(guard.value()).map_err(storage_err)?;
        Ok(Some(execution))
    }

    /// Cancel the active execution, if any, releasing the lock marker.
    /// Returns the cancelled row, or `None` when nothing was active.
    pub fn cancel_active(&self, project_id: Uuid) -> Result<Option<Execution>> {
        let correlation = match self.active_correlation(project_id)? {
            Some(c) => c,
            None => return Ok(None),
        };
        match self.transition(correlation, TransitionUpdate::cancelled()) {
            Ok(execution) => Ok(Some(execution)),
            // The worker finished in the window between the marker read and
            // the transition. That is the no-op case, not an error.
            Err(DocforgeError::InvalidTransition { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn active_correlation(&self, project_id: Uuid) -> Result<Option<Uuid>> {
        let rt = self.db.begin_read().map_err(storage_err)?;
        let active = rt.open_table(ACTIVE).map_err(storage_err)?;
        match active
            .get(project_id.as_bytes().as_slice())
            .map_err(storage_err)?
        {
            Some(guard) => Ok(Some(Uuid::from_slice(guard.value()).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    /// All executions of a project, oldest-first.
    pub fn list_for_project(&self, project_id: Uuid) -> Result<Vec<Execution>> {
        let (low, high) = history_bounds(project_id);
        let rt = self.db.begin_read().map_err(storage_err)?;
        let history = rt.open_table(HISTORY).map_err(storage_err)?;
        let executions = rt.open_table(EXECUTIONS).map_err(storage_err)?;
        let mut result = Vec::new();
        for entry in history
            .range(low.as_slice()..=high.as_slice())
            .map_err(storage_err)?
        {
            let (_, v) = entry.map_err(storage_err)?;
            let correlation = Uuid::from_slice(v.value()).map_err(storage_err)?;
            let Some(guard) = executions
                .get(correlation.as_bytes().as_slice())
                .map_err(storage_err)?
            else {
                continue; // pruned row, stale index entry
            };
            let execution: Execution =
                serde_json::from_slice(guard.value()).map_err(storage_err)?;
            result.push(execution);
        }
        Ok(result)
    }

    /// The most recently started execution of a project, if any.
    pub fn latest_for_project(&self, project_id: Uuid) -> Result<Option<Execution>> {
        Ok(self.list_for_project(project_id)?.pop())
    }

    /// Force-fail executions stuck in an active status past `max_age`.
    ///
    /// Bypasses the transition legality table: the process that owned these
    /// rows is gone, so `pending` rows (crash before dispatch) are swept the
    /// same way as `running` ones. Lock markers are released. Returns the
    /// rows as rewritten.
    pub fn recover_stale(&self, max_age: Duration) -> Result<Vec<Execution>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).map_err(storage_err)?;

        let stale: Vec<Execution> = self
            .all_executions()?
            .into_iter()
            .filter(|e| e.status.is_active() && e.updated_at < cutoff)
            .collect();

        let mut recovered = Vec::with_capacity(stale.len());
        for mut execution in stale {
            let now = Utc::now();
            execution.status = ExecutionStatus::Failed;
            execution.error_message =
                Some("recovered after liveness timeout: owning process died".to_string());
            execution.updated_at = now;
            execution.completed_at = Some(now);

            let value = serde_json::to_vec(&execution).map_err(storage_err)?;
            let wt = self.db.begin_write().map_err(storage_err)?;
            {
                let mut executions = wt.open_table(EXECUTIONS).map_err(storage_err)?;
                executions
                    .insert(
                        execution.correlation_id.as_bytes().as_slice(),
                        value.as_slice(),
                    )
                    .map_err(storage_err)?;
                release_marker(&wt, execution.project_id, execution.correlation_id)?;
            }
            wt.commit().map_err(storage_err)?;
            recovered.push(execution);
        }
        Ok(recovered)
    }

    /// Remove terminal rows older than `older_than`. Returns the number
    /// removed. Active rows are never pruned.
    pub fn prune(&self, older_than: Duration) -> Result<u32> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).map_err(storage_err)?;

        let victims: Vec<Execution> = self
            .all_executions()?
            .into_iter()
            .filter(|e| {
                e.status.is_terminal() && e.completed_at.map_or(false, |done| done < cutoff)
            })
            .collect();
        if victims.is_empty() {
            return Ok(0);
        }

        let wt = self.db.begin_write().map_err(storage_err)?;
        {
            let mut executions = wt.open_table(EXECUTIONS).map_err(storage_err)?;
            let mut history = wt.open_table(HISTORY).map_err(storage_err)?;
            for execution in &victims {
                executions
                    .remove(execution.correlation_id.as_bytes().as_slice())
                    .map_err(storage_err)?;
                let hkey = history_key(
                    execution.project_id,
                    execution.started_at,
                    execution.correlation_id,
                );
                history.remove(hkey.as_slice()).map_err(storage_err)?;
            }
        }
        wt.commit().map_err(storage_err)?;
        Ok(victims.len() as u32)
    }

    fn all_executions(&self) -> Result<Vec<Execution>> {
        let rt = self.db.begin_read().map_err(storage_err)?;
        let executions = rt.open_table(EXECUTIONS).map_err(storage_err)?;
        let mut result = Vec::new();
        for entry in executions.iter().map_err(storage_err)? {
            let (_, v) = entry.map_err(storage_err)?;
            let execution: Execution =
                serde_json::from_slice(v.value()).map_err(storage_err)?;
            result.push(execution);
        }
        Ok(result)
    }
}

/// Remove the project's lock marker if it still points at `correlation_id`.
fn release_marker(
    wt: &redb::WriteTransaction,
    project_id: Uuid,
    correlation_id: Uuid,
) -> Result<()> {
    let mut active = wt.open_table(ACTIVE).map_err(storage_err)?;
    let holds = match active
        .get(project_id.as_bytes().as_slice())
        .map_err(storage_err)?
    {
        Some(guard) => guard.value() == correlation_id.as_bytes().as_slice(),
        None => false,
    };
    if holds {
        active
            .remove(project_id.as_bytes().as_slice())
            .map_err(storage_err)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_database;
    use crate::types::Stage;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, ExecutionLedger) {
        let dir = TempDir::new().unwrap();
        let db = open_database(&dir.path().join("test.redb")).unwrap();
        (dir, ExecutionLedger::new(db).unwrap())
    }

    fn pending(project_id: Uuid, stage: Stage) -> Execution {
        Execution::new(project_id, stage, serde_json::json!({}))
    }

    #[test]
    fn record_then_find_active() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();
        let ex = pending(project, Stage::BusinessAnalysis);
        ledger.record(&ex).unwrap();

        let active = ledger.find_active(project).unwrap().unwrap();
        assert_eq!(active.correlation_id, ex.correlation_id);
        assert_eq!(active.status, ExecutionStatus::Pending);
    }

    #[test]
    fn second_record_for_same_project_conflicts() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();
        ledger.record(&pending(project, Stage::BusinessAnalysis)).unwrap();

        let err = ledger
            .record(&pending(project, Stage::BusinessAnalysis))
            .unwrap_err();
        assert!(matches!(
            err,
            DocforgeError::ConcurrentExecution { project_id } if project_id == project
        ));
        // The losing row must not exist anywhere.
        assert_eq!(ledger.list_for_project(project).unwrap().len(), 1);
    }

    #[test]
    fn different_projects_do_not_conflict() {
        let (_dir, ledger) = open_tmp();
        ledger
            .record(&pending(Uuid::new_v4(), Stage::BusinessAnalysis))
            .unwrap();
        ledger
            .record(&pending(Uuid::new_v4(), Stage::BusinessAnalysis))
            .unwrap();
    }

    #[test]
    fn full_transition_flow_releases_lock() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();
        let ex = pending(project, Stage::EngineeringStandards);
        ledger.record(&ex).unwrap();

        ledger
            .transition(ex.correlation_id, TransitionUpdate::running())
            .unwrap();
        let done = ledger
            .transition(
                ex.correlation_id,
                TransitionUpdate::completed(2, serde_json::json!({"document_version": 1})),
            )
            .unwrap();

        assert_eq!(done.status, ExecutionStatus::Completed);
        assert_eq!(done.attempts, 2);
        assert!(done.completed_at.is_some());
        assert!(ledger.find_active(project).unwrap().is_none());

        // Lock released: a new attempt is accepted.
        ledger.record(&pending(project, Stage::EngineeringStandards)).unwrap();
    }

    #[test]
    fn transition_out_of_terminal_is_invalid() {
        let (_dir, ledger) = open_tmp();
        let ex = pending(Uuid::new_v4(), Stage::Architecture);
        ledger.record(&ex).unwrap();
        ledger
            .transition(ex.correlation_id, TransitionUpdate::running())
            .unwrap();
        ledger
            .transition(ex.correlation_id, TransitionUpdate::failed(1, "boom"))
            .unwrap();

        let err = ledger
            .transition(ex.correlation_id, TransitionUpdate::cancelled())
            .unwrap_err();
        assert!(matches!(err, DocforgeError::InvalidTransition { .. }));
    }

    #[test]
    fn skipping_running_is_invalid() {
        let (_dir, ledger) = open_tmp();
        let ex = pending(Uuid::new_v4(), Stage::BusinessAnalysis);
        ledger.record(&ex).unwrap();
        let err = ledger
            .transition(
                ex.correlation_id,
                TransitionUpdate::completed(1, serde_json::json!({})),
            )
            .unwrap_err();
        assert!(matches!(err, DocforgeError::InvalidTransition { .. }));
    }

    #[test]
    fn pending_can_be_cancelled() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();
        let ex = pending(project, Stage::BusinessAnalysis);
        ledger.record(&ex).unwrap();

        let cancelled = ledger.cancel_active(project).unwrap().unwrap();
        assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
        assert!(ledger.find_active(project).unwrap().is_none());
    }

    #[test]
    fn cancel_active_is_idempotent() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();
        let ex = pending(project, Stage::BusinessAnalysis);
        ledger.record(&ex).unwrap();
        ledger
            .transition(ex.correlation_id, TransitionUpdate::running())
            .unwrap();

        assert!(ledger.cancel_active(project).unwrap().is_some());
        assert!(ledger.cancel_active(project).unwrap().is_none());
        assert!(ledger.cancel_active(project).unwrap().is_none());
    }

    #[test]
    fn touch_attempt_updates_counter_and_heartbeat() {
        let (_dir, ledger) = open_tmp();
        let ex = pending(Uuid::new_v4(), Stage::BusinessAnalysis);
        ledger.record(&ex).unwrap();
        ledger
            .transition(ex.correlation_id, TransitionUpdate::running())
            .unwrap();

        let before = ledger
            .find_by_correlation(ex.correlation_id)
            .unwrap()
            .unwrap()
            .updated_at;
        let touched = ledger.touch_attempt(ex.correlation_id, 3).unwrap();
        assert_eq!(touched.attempts, 3);
        assert_eq!(touched.status, ExecutionStatus::Running);
        assert!(touched.updated_at >= before);
    }

    #[test]
    fn touch_attempt_on_terminal_row_is_invalid() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();
        let ex = pending(project, Stage::BusinessAnalysis);
        ledger.record(&ex).unwrap();
        ledger.cancel_active(project).unwrap();

        let err = ledger.touch_attempt(ex.correlation_id, 2).unwrap_err();
        assert!(matches!(err, DocforgeError::InvalidTransition { .. }));
    }

    #[test]
    fn transition_unknown_correlation_is_not_found() {
        let (_dir, ledger) = open_tmp();
        let err = ledger
            .transition(Uuid::new_v4(), TransitionUpdate::running())
            .unwrap_err();
        assert!(matches!(err, DocforgeError::ExecutionNotFound(_)));
    }

    #[test]
    fn list_for_project_is_oldest_first() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();

        let mut first = pending(project, Stage::BusinessAnalysis);
        first.started_at = Utc::now() - chrono::Duration::seconds(30);
        ledger.record(&first).unwrap();
        ledger
            .transition(first.correlation_id, TransitionUpdate::running())
            .unwrap();
        ledger
            .transition(
                first.correlation_id,
                TransitionUpdate::completed(1, serde_json::json!({})),
            )
            .unwrap();

        let second = pending(project, Stage::EngineeringStandards);
        ledger.record(&second).unwrap();

        let list = ledger.list_for_project(project).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].correlation_id, first.correlation_id);
        assert_eq!(list[1].correlation_id, second.correlation_id);

        let latest = ledger.latest_for_project(project).unwrap().unwrap();
        assert_eq!(latest.correlation_id, second.correlation_id);
    }

    #[test]
    fn find_by_correlation() {
        let (_dir, ledger) = open_tmp();
        let ex = pending(Uuid::new_v4(), Stage::Architecture);
        ledger.record(&ex).unwrap();
        let found = ledger.find_by_correlation(ex.correlation_id).unwrap().unwrap();
        assert_eq!(found.project_id, ex.project_id);
        assert!(ledger.find_by_correlation(Uuid::new_v4()).unwrap().is_none());
    }

    fn backdate(ledger: &ExecutionLedger, correlation_id: Uuid, updated_at: DateTime<Utc>) {
        let mut ex = ledger.find_by_correlation(correlation_id).unwrap().unwrap();
        ex.updated_at = updated_at;
        let value = serde_json::to_vec(&ex).unwrap();
        let wt = ledger.db.begin_write().unwrap();
        {
            let mut table = wt.open_table(EXECUTIONS).unwrap();
            table
                .insert(correlation_id.as_bytes().as_slice(), value.as_slice())
                .unwrap();
        }
        wt.commit().unwrap();
    }

    #[test]
    fn recover_stale_fails_old_running_and_releases_lock() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();
        let ex = pending(project, Stage::BusinessAnalysis);
        ledger.record(&ex).unwrap();
        ledger
            .transition(ex.correlation_id, TransitionUpdate::running())
            .unwrap();
        backdate(&ledger, ex.correlation_id, Utc::now() - chrono::Duration::minutes(30));

        let recovered = ledger.recover_stale(Duration::from_secs(15 * 60)).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].status, ExecutionStatus::Failed);
        assert!(recovered[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("recovered"));
        assert!(ledger.find_active(project).unwrap().is_none());

        // Retryable: the project accepts a fresh attempt.
        ledger.record(&pending(project, Stage::BusinessAnalysis)).unwrap();
    }

    #[test]
    fn recover_stale_leaves_recent_rows_alone() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();
        let ex = pending(project, Stage::BusinessAnalysis);
        ledger.record(&ex).unwrap();
        ledger
            .transition(ex.correlation_id, TransitionUpdate::running())
            .unwrap();

        let recovered = ledger.recover_stale(Duration::from_secs(15 * 60)).unwrap();
        assert!(recovered.is_empty());
        assert!(ledger.find_active(project).unwrap().is_some());
    }

    #[test]
    fn prune_removes_only_old_terminal_rows() {
        let (_dir, ledger) = open_tmp();
        let project = Uuid::new_v4();

        let old = pending(project, Stage::BusinessAnalysis);
        ledger.record(&old).unwrap();
        ledger
            .transition(old.correlation_id, TransitionUpdate::running())
            .unwrap();
        ledger
            .transition(
                old.correlation_id,
                TransitionUpdate::completed(1, serde_json::json!({})),
            )
            .unwrap();
        // Backdate completion far past the horizon.
        {
            let mut ex = ledger
                .find_by_correlation(old.correlation_id)
                .unwrap()
                .unwrap();
            ex.completed_at = Some(Utc::now() - chrono::Duration::days(90));
            let value = serde_json::to_vec(&ex).unwrap();
            let wt = ledger.db.begin_write().unwrap();
            {
                let mut table = wt.open_table(EXECUTIONS).unwrap();
                table
                    .insert(old.correlation_id.as_bytes().as_slice(), value.as_slice())
                    .unwrap();
            }
            wt.commit().unwrap();
        }

        let fresh = pending(project, Stage::EngineeringStandards);
        ledger.record(&fresh).unwrap();

        let pruned = ledger.prune(Duration::from_secs(30 * 24 * 3600)).unwrap();
        assert_eq!(pruned, 1);
        assert!(ledger
            .find_by_correlation(old.correlation_id)
            .unwrap()
            .is_none());
        // Active row untouched.
        assert!(ledger.find_active(project).unwrap().is_some());
        let remaining = ledger.list_for_project(project).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].correlation_id, fresh.correlation_id);
    }
}
