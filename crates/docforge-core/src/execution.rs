use crate::types::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }

    /// A terminal row never changes again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Active rows count against the one-per-project limit.
    pub fn is_active(self) -> bool {
        matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }

    pub fn allowed_transitions(self) -> &'static [ExecutionStatus] {
        match self {
            // Cancelling before dispatch is legal; completing or failing
            // without ever running is not.
            ExecutionStatus::Pending => {
                &[ExecutionStatus::Running, ExecutionStatus::Cancelled]
            }
            ExecutionStatus::Running => &[
                ExecutionStatus::Completed,
                ExecutionStatus::Failed,
                ExecutionStatus::Cancelled,
            ],
            ExecutionStatus::Completed
            | ExecutionStatus::Failed
            | ExecutionStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// One audited attempt to run a stage for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub correlation_id: Uuid,
    pub project_id: Uuid,
    pub stage: Stage,
    pub status: ExecutionStatus,
    /// Generation attempts consumed, including retries of transient faults.
    pub attempts: u32,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(project_id: Uuid, stage: Stage, input: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            correlation_id: Uuid::new_v4(),
            project_id,
            stage,
            status: ExecutionStatus::Pending,
            attempts: 0,
            input,
            output: None,
            error_message: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TransitionUpdate
// ---------------------------------------------------------------------------

/// Payload applied by the ledger alongside a status change.
#[derive(Debug, Clone)]
pub struct TransitionUpdate {
    pub status: ExecutionStatus,
    pub attempts: Option<u32>,
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl TransitionUpdate {
    pub fn running() -> Self {
        Self {
            status: ExecutionStatus::Running,
            attempts: None,
            output: None,
            error_message: None,
        }
    }

    pub fn completed(attempts: u32, output: serde_json::Value) -> Self {
        Self {
            status: ExecutionStatus::Completed,
            attempts: Some(attempts),
            output: Some(output),
            error_message: None,
        }
    }

    pub fn failed(attempts: u32, message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            attempts: Some(attempts),
            output: None,
            error_message: Some(message.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: ExecutionStatus::Cancelled,
            attempts: None,
            output: None,
            error_message: None,
        }
    }
}
