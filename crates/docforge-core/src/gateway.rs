//! Contracts for the external collaborators a stage run depends on.
//!
//! The orchestrator only sees these traits. HTTP implementations live in
//! the `docforge-gateway` crate; tests substitute in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::types::{DocumentKind, Stage};

// ---------------------------------------------------------------------------
// ServiceFault
// ---------------------------------------------------------------------------

/// Whether a collaborator failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Timeouts, overload, transport errors. Retried within the backoff
    /// budget.
    Transient,
    /// Rejections and validation failures. Fails the execution immediately.
    Permanent,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceFault {
    pub kind: FaultKind,
    pub message: String,
}

impl ServiceFault {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FaultKind::Transient
    }
}

// ---------------------------------------------------------------------------
// Context retrieval
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    /// Restrict hits to material relevant to one stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_filter: Option<Stage>,
    pub query_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub source: String,
    pub content: String,
    pub score: f64,
}

/// Read-only search over tenant and project knowledge.
#[async_trait]
pub trait ContextRetrieval: Send + Sync {
    async fn search(&self, query: SearchQuery) -> Result<Vec<ContextSnippet>, ServiceFault>;
}

// ---------------------------------------------------------------------------
// Step generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorDocument {
    pub kind: DocumentKind,
    pub version: u64,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub correlation_id: Uuid,
    pub stage: Stage,
    pub project_name: String,
    /// Free-form caller payload passed through from the start request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    pub context: Vec<ContextSnippet>,
    /// Latest versions of every predecessor stage's document, in stage
    /// order.
    pub prior_documents: Vec<PriorDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicDocument {
    pub number: u32,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub content: String,
    pub confidence_score: f64,
    /// Per-epic sub-documents. Populated only by the implementation
    /// planning stage.
    #[serde(default)]
    pub epics: Vec<EpicDocument>,
}

/// One documentation-generation step. `generate` honors `cancel` on a
/// best-effort basis: implementations should give up waiting when it
/// fires, but the service may still finish the work server-side.
#[async_trait]
pub trait StepGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
    ) -> Result<GeneratedDocument, ServiceFault>;
}
