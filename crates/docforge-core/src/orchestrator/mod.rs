//! Workflow orchestration.
//!
//! [`Orchestrator`] owns stage dispatch: it validates stage order, claims
//! the project's single execution slot through the ledger's conditional
//! insert, spawns the stage task and hands back a correlation id. Progress,
//! cancellation and crash recovery all route through here so the ledger,
//! the document store and the event stream stay consistent with each other.

mod worker;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::config::Config;
use crate::db::Stores;
use crate::document::DocumentKey;
use crate::error::{DocforgeError, Result};
use crate::events::{ProgressBroadcaster, ProgressEvent};
use crate::execution::{Execution, ExecutionStatus};
use crate::gateway::{ContextRetrieval, StepGenerator};
use crate::project::Project;
use crate::retry::RetryPolicy;
use crate::types::{ProjectStatus, Stage};

/// Registry entry for a stage task running in this process. The ledger is
/// the authority on what is active; this map only carries the cancel flag
/// to the task.
struct RunningStage {
    correlation_id: Uuid,
    cancel: CancelSignal,
}

type RunningMap = Mutex<HashMap<Uuid, RunningStage>>;

pub struct Orchestrator {
    stores: Stores,
    events: Arc<ProgressBroadcaster>,
    retrieval: Arc<dyn ContextRetrieval>,
    generator: Arc<dyn StepGenerator>,
    retry: RetryPolicy,
    liveness_timeout: Duration,
    retention: Duration,
    running: Arc<RunningMap>,
}

impl Orchestrator {
    pub fn new(
        stores: Stores,
        events: Arc<ProgressBroadcaster>,
        retrieval: Arc<dyn ContextRetrieval>,
        generator: Arc<dyn StepGenerator>,
        config: &Config,
    ) -> Self {
        Self {
            stores,
            events,
            retrieval,
            generator,
            retry: RetryPolicy::from_config(&config.retry),
            liveness_timeout: Duration::from_secs(
                u64::from(config.ledger.liveness_timeout_minutes) * 60,
            ),
            retention: Duration::from_secs(u64::from(config.ledger.retention_days) * 24 * 3600),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn events(&self) -> &Arc<ProgressBroadcaster> {
        &self.events
    }

    /// Validate stage order, claim the project's execution slot and
    /// dispatch a stage task. `input` is a free-form caller payload,
    /// recorded on the execution and forwarded to generation. Returns the
    /// new execution's correlation id.
    pub async fn start_stage(
        &self,
        project_id: Uuid,
        stage_number: u8,
        input: Option<serde_json::Value>,
    ) -> Result<Uuid> {
        let stage = Stage::from_number(stage_number)?;
        let project = self.stores.projects.get(project_id)?;
        self.check_stage_order(&project, stage)?;

        let snapshot = serde_json::json!({
            "stage": stage.as_str(),
            "stage_number": stage.number(),
            "request": input,
        });
        let execution = Execution::new(project_id, stage, snapshot);
        let correlation_id = execution.correlation_id;
        // Conditional insert: either this call owns the project's slot now
        // or it fails with ConcurrentExecution.
        self.stores.ledger.record(&execution)?;

        let cancel = CancelSignal::new();
        self.running.lock().await.insert(
            project_id,
            RunningStage {
                correlation_id,
                cancel: cancel.clone(),
            },
        );

        if let Err(e) = self
            .stores
            .projects
            .update(project_id, |p| p.status = ProjectStatus::Processing)
        {
            // Release the slot so a task that never started cannot hold
            // the project hostage.
            self.remove_running(project_id, correlation_id).await;
            let _ = self.stores.ledger.cancel_active(project_id);
            return Err(e);
        }

        let ctx = worker::WorkerContext {
            stores: self.stores.clone(),
            events: Arc::clone(&self.events),
            retrieval: Arc::clone(&self.retrieval),
            generator: Arc::clone(&self.generator),
            retry: self.retry.clone(),
            running: Arc::clone(&self.running),
            project,
            stage,
            correlation_id,
            input,
            cancel,
        };
        tokio::spawn(worker::run(ctx));

        info!(%project_id, %correlation_id, stage = %stage, "stage dispatched");
        Ok(correlation_id)
    }

    /// A stage may start at the workflow pointer, or one past it when the
    /// pointer's own document already exists. The latter shape is what a
    /// crash between document write and pointer advance leaves behind.
    fn check_stage_order(&self, project: &Project, stage: Stage) -> Result<()> {
        let requested = stage.number();
        let current = project.current_step;
        if requested == current {
            return Ok(());
        }
        if requested == current + 1 {
            let pointer_stage = Stage::from_number(current)?;
            let key = DocumentKey::primary(project.id, pointer_stage.document_kind());
            if self.stores.documents.get_latest(key)?.is_some() {
                return Ok(());
            }
        }
        Err(DocforgeError::InvalidStageOrder {
            requested,
            current_step: current,
        })
    }

    /// Cancel whatever is active for the project. Idempotent: with nothing
    /// active this reports `cancelled: false`.
    pub async fn cancel_stage(&self, project_id: Uuid) -> Result<CancelOutcome> {
        // Unknown projects are an error, not a clean no-op.
        self.stores.projects.get(project_id)?;

        // Flag first: the task must be able to observe cancellation no
        // later than the ledger row flips.
        {
            let running = self.running.lock().await;
            if let Some(active) = running.get(&project_id) {
                active.cancel.cancel();
            }
        }

        let cancelled = self.stores.ledger.cancel_active(project_id)?;
        let Some(execution) = cancelled else {
            return Ok(CancelOutcome {
                cancelled: false,
                correlation_id: None,
            });
        };

        self.remove_running(project_id, execution.correlation_id).await;
        self.stores.projects.update(project_id, |p| {
            if p.status == ProjectStatus::Processing {
                p.status = ProjectStatus::Draft;
            }
        })?;

        info!(%project_id, correlation_id = %execution.correlation_id, "stage cancelled");
        Ok(CancelOutcome {
            cancelled: true,
            correlation_id: Some(execution.correlation_id),
        })
    }

    /// Remove the registry entry, but only while it still belongs to the
    /// given execution. A newer run may have replaced it.
    async fn remove_running(&self, project_id: Uuid, correlation_id: Uuid) {
        let mut running = self.running.lock().await;
        if running
            .get(&project_id)
            .map(|r| r.correlation_id == correlation_id)
            .unwrap_or(false)
        {
            running.remove(&project_id);
        }
    }

    /// Point-in-time view assembled from the project row, the ledger and
    /// the document store.
    pub async fn get_progress(&self, project_id: Uuid) -> Result<Progress> {
        let project = self.stores.projects.get(project_id)?;
        let active = self.stores.ledger.find_active(project_id)?;
        let latest = self.stores.ledger.latest_for_project(project_id)?;

        let mut stages = Vec::with_capacity(Stage::all().len());
        for stage in Stage::all() {
            let key = DocumentKey::primary(project_id, stage.document_kind());
            let latest_version = self.stores.documents.get_latest(key)?.map(|d| d.version);

            let is_running = active.as_ref().map(|ex| ex.stage == *stage).unwrap_or(false);
            let state = if is_running {
                StageState::Running
            } else if latest_version.is_some() {
                StageState::Completed
            } else if latest
                .as_ref()
                .map(|ex| ex.stage == *stage && ex.status == ExecutionStatus::Failed)
                .unwrap_or(false)
            {
                StageState::Failed
            } else if stage.number() == project.current_step {
                StageState::Available
            } else {
                StageState::Locked
            };

            let attempts = if is_running {
                active.as_ref().map(|ex| ex.attempts)
            } else {
                None
            };

            stages.push(StageProgress {
                stage: *stage,
                number: stage.number(),
                state,
                latest_version,
                attempts,
            });
        }

        Ok(Progress {
            project,
            active,
            stages,
        })
    }

    /// Backlog snapshot plus a live receiver for the project's events.
    pub async fn subscribe(
        &self,
        project_id: Uuid,
    ) -> Result<(Vec<ProgressEvent>, broadcast::Receiver<ProgressEvent>)> {
        self.stores.projects.get(project_id)?;
        Ok(self.events.subscribe(project_id).await)
    }

    /// Sweep executions whose owning process died. Stuck rows become
    /// failed (and thereby retryable), their projects are marked failed
    /// and a step_error event tells any watcher what happened.
    pub async fn recover(&self) -> Result<Vec<Execution>> {
        let recovered = self.stores.ledger.recover_stale(self.liveness_timeout)?;
        for execution in &recovered {
            warn!(
                project_id = %execution.project_id,
                correlation_id = %execution.correlation_id,
                stage = %execution.stage,
                "recovered execution stuck past the liveness timeout"
            );
            self.stores
                .projects
                .update(execution.project_id, |p| p.status = ProjectStatus::Failed)?;
            let message = execution
                .error_message
                .clone()
                .unwrap_or_else(|| "execution recovered after liveness timeout".to_string());
            self.events
                .publish(ProgressEvent::step_error(
                    execution.project_id,
                    execution.correlation_id,
                    execution.stage,
                    message,
                ))
                .await;
        }
        Ok(recovered)
    }

    /// Drop terminal ledger rows past the retention horizon.
    pub fn prune_ledger(&self) -> Result<u32> {
        self.stores.ledger.prune(self.retention)
    }
}

// ---------------------------------------------------------------------------
// Progress view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// A document version exists for this stage.
    Completed,
    /// An execution for this stage is pending or running right now.
    Running,
    /// Next in line: the workflow pointer is here.
    Available,
    /// Blocked until earlier stages complete.
    Locked,
    /// The most recent execution for this stage failed and no document
    /// was produced.
    Failed,
}

impl StageState {
    pub fn as_str(self) -> &'static str {
        match self {
            StageState::Completed => "completed",
            StageState::Running => "running",
            StageState::Available => "available",
            StageState::Locked => "locked",
            StageState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub stage: Stage,
    pub number: u8,
    pub state: StageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub project: Project,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<Execution>,
    pub stages: Vec<StageProgress>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
