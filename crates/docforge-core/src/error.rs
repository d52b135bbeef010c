use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DocforgeError {
    #[error("not initialized: run 'docforge init'")]
    NotInitialized,

    #[error("project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("document not found: {project_id}/{kind}")]
    DocumentNotFound { project_id: Uuid, kind: String },

    #[error("an execution is already pending or running for project {project_id}")]
    ConcurrentExecution { project_id: Uuid },

    #[error("cannot start stage {requested}: project is at step {current_step}")]
    InvalidStageOrder { requested: u8, current_step: u8 },

    #[error("invalid stage number: {0} (expected 1-4)")]
    InvalidStage(u8),

    #[error("invalid stage name: {0}")]
    InvalidStageName(String),

    #[error("invalid document type: {0}")]
    InvalidDocumentKind(String),

    #[error("invalid project status: {0}")]
    InvalidProjectStatus(String),

    #[error("invalid transition for execution {correlation_id}: {from} -> {to}")]
    InvalidTransition {
        correlation_id: Uuid,
        from: String,
        to: String,
    },

    #[error("epic sub-documents are only valid for implementation_plan")]
    EpicOnPrimaryKind,

    #[error("invalid epic number: {0} (expected >= 1)")]
    InvalidEpicNumber(u32),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DocforgeError>;

/// Collapses redb's various error types into [`DocforgeError::Storage`].
pub(crate) fn storage_err<E: std::fmt::Display>(e: E) -> DocforgeError {
    DocforgeError::Storage(e.to_string())
}
