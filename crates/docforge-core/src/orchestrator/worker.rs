//! The stage task spawned by [`super::Orchestrator::start_stage`].
//!
//! One task per execution: it moves the ledger row to running, retrieves
//! context, calls the generator with bounded backoff on transient faults,
//! stores the resulting document versions and lands the row in a terminal
//! status. Cancellation is cooperative: the task checks its flag at every
//! suspension point and never rolls back work that already persisted.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::RunningMap;
use crate::cancel::CancelSignal;
use crate::db::Stores;
use crate::document::DocumentKey;
use crate::error::DocforgeError;
use crate::events::{ProgressBroadcaster, ProgressEvent};
use crate::execution::{ExecutionStatus, TransitionUpdate};
use crate::gateway::{
    ContextRetrieval, GeneratedDocument, GenerationRequest, PriorDocument, SearchQuery,
    ServiceFault, StepGenerator,
};
use crate::project::Project;
use crate::retry::RetryPolicy;
use crate::types::{ProjectStatus, Stage};

pub(super) struct WorkerContext {
    pub stores: Stores,
    pub events: Arc<ProgressBroadcaster>,
    pub retrieval: Arc<dyn ContextRetrieval>,
    pub generator: Arc<dyn StepGenerator>,
    pub retry: RetryPolicy,
    pub running: Arc<RunningMap>,
    pub project: Project,
    pub stage: Stage,
    pub correlation_id: Uuid,
    pub input: Option<serde_json::Value>,
    pub cancel: CancelSignal,
}

pub(super) async fn run(ctx: WorkerContext) {
    let project_id = ctx.project.id;
    let correlation_id = ctx.correlation_id;

    run_inner(&ctx).await;

    // Deregister, unless a newer run already replaced the entry.
    let mut running = ctx.running.lock().await;
    if running
        .get(&project_id)
        .map(|r| r.correlation_id == correlation_id)
        .unwrap_or(false)
    {
        running.remove(&project_id);
    }
}

async fn run_inner(ctx: &WorkerContext) {
    match ctx
        .stores
        .ledger
        .transition(ctx.correlation_id, TransitionUpdate::running())
    {
        Ok(_) => {}
        Err(DocforgeError::InvalidTransition { .. }) => {
            // Cancelled before dispatch; nothing was started.
            debug!(correlation_id = %ctx.correlation_id, "execution cancelled before it ran");
            return;
        }
        Err(e) => {
            error!(
                correlation_id = %ctx.correlation_id,
                error = %e,
                "could not mark execution running"
            );
            return;
        }
    }

    ctx.events
        .publish(ProgressEvent::step_start(
            ctx.project.id,
            ctx.correlation_id,
            ctx.stage,
        ))
        .await;

    let mut attempt: u32 = 1;
    let outcome = loop {
        if ctx.cancel.is_cancelled() {
            observed_cancel(ctx);
            return;
        }

        // Attempt counter and liveness heartbeat in one write. A terminal
        // row here means the execution was cancelled while we backed off.
        match ctx.stores.ledger.touch_attempt(ctx.correlation_id, attempt) {
            Ok(_) => {}
            Err(DocforgeError::InvalidTransition { .. }) => {
                observed_cancel(ctx);
                return;
            }
            Err(e) => {
                error!(correlation_id = %ctx.correlation_id, error = %e, "heartbeat write failed");
                return;
            }
        }

        match attempt_once(ctx).await {
            Ok(generated) => break Ok(generated),
            Err(fault) if fault.is_transient() && attempt < ctx.retry.max_attempts() => {
                let delay = ctx.retry.jittered(ctx.retry.delay_for(attempt));
                warn!(
                    correlation_id = %ctx.correlation_id,
                    stage = %ctx.stage,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %fault,
                    "transient fault, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancel.cancelled() => {
                        observed_cancel(ctx);
                        return;
                    }
                }
                attempt += 1;
            }
            Err(fault) => break Err(fault),
        }
    };

    match outcome {
        Ok(generated) => complete(ctx, generated, attempt).await,
        Err(fault) => fail(ctx, fault, attempt).await,
    }
}

/// One pass: retrieve context, load predecessor documents, generate.
async fn attempt_once(ctx: &WorkerContext) -> Result<GeneratedDocument, ServiceFault> {
    let query = SearchQuery {
        tenant_id: ctx.project.tenant_id,
        project_id: ctx.project.id,
        stage_filter: Some(ctx.stage),
        query_text: format!("{}: {}", ctx.project.name, ctx.stage.title()),
    };
    let context = ctx.retrieval.search(query).await?;

    let request = GenerationRequest {
        tenant_id: ctx.project.tenant_id,
        project_id: ctx.project.id,
        correlation_id: ctx.correlation_id,
        stage: ctx.stage,
        project_name: ctx.project.name.clone(),
        input: ctx.input.clone(),
        context,
        prior_documents: load_priors(ctx)?,
    };
    ctx.generator.generate(request, ctx.cancel.clone()).await
}

fn load_priors(ctx: &WorkerContext) -> Result<Vec<PriorDocument>, ServiceFault> {
    let mut priors = Vec::new();
    for stage in ctx.stage.predecessors() {
        let kind = stage.document_kind();
        let key = DocumentKey::primary(ctx.project.id, kind);
        let doc = ctx
            .stores
            .documents
            .get_latest(key)
            .map_err(|e| ServiceFault::permanent(format!("could not load {kind} document: {e}")))?
            .ok_or_else(|| {
                ServiceFault::permanent(format!(
                    "no {kind} document exists, required by {}",
                    ctx.stage
                ))
            })?;
        priors.push(PriorDocument {
            kind,
            version: doc.version,
            content: doc.content,
        });
    }
    Ok(priors)
}

async fn complete(ctx: &WorkerContext, generated: GeneratedDocument, attempts: u32) {
    if ctx.cancel.is_cancelled() {
        // Generation finished but the execution was cancelled. The row is
        // already (or is about to be) cancelled; drop the result.
        observed_cancel(ctx);
        return;
    }

    let key = DocumentKey::primary(ctx.project.id, ctx.stage.document_kind());
    let stored = match ctx.stores.documents.put_version(
        key,
        generated.content,
        Some(generated.confidence_score),
        ctx.correlation_id,
    ) {
        Ok(v) => v,
        Err(e) => {
            fail(
                ctx,
                ServiceFault::permanent(format!("could not store document: {e}")),
                attempts,
            )
            .await;
            return;
        }
    };

    let mut epic_count = 0u32;
    if ctx.stage.document_kind().supports_epics() {
        for epic in &generated.epics {
            let epic_key =
                DocumentKey::epic(ctx.project.id, ctx.stage.document_kind(), epic.number);
            let content = format!("# {}\n\n{}", epic.title, epic.content);
            match ctx.stores.documents.put_version(
                epic_key,
                content,
                Some(generated.confidence_score),
                ctx.correlation_id,
            ) {
                Ok(_) => epic_count += 1,
                Err(e) => {
                    fail(
                        ctx,
                        ServiceFault::permanent(format!(
                            "could not store epic {} document: {e}",
                            epic.number
                        )),
                        attempts,
                    )
                    .await;
                    return;
                }
            }
        }
    } else if !generated.epics.is_empty() {
        warn!(
            correlation_id = %ctx.correlation_id,
            stage = %ctx.stage,
            count = generated.epics.len(),
            "generator returned epics for a stage that does not take them, ignoring"
        );
    }

    let output = serde_json::json!({
        "document_version": stored.version,
        "confidence_score": generated.confidence_score,
        "epics": epic_count,
    });
    match ctx
        .stores
        .ledger
        .transition(ctx.correlation_id, TransitionUpdate::completed(attempts, output))
    {
        Ok(_) => {}
        Err(DocforgeError::InvalidTransition { .. }) => {
            discard_after_race(ctx, "completion").await;
            return;
        }
        Err(e) => {
            error!(correlation_id = %ctx.correlation_id, error = %e, "could not record completion");
            return;
        }
    }

    let final_stage = ctx.stage.is_final();
    let advanced = ctx.stores.projects.update(ctx.project.id, |p| {
        if final_stage {
            p.status = ProjectStatus::Completed;
        } else {
            p.current_step = ctx.stage.number() + 1;
            p.status = ProjectStatus::Draft;
        }
    });
    if let Err(e) = advanced {
        // The next start_stage call can still repair this: the document
        // exists one past the pointer.
        error!(project_id = %ctx.project.id, error = %e, "could not advance workflow pointer");
    }

    ctx.events
        .publish(ProgressEvent::step_complete(
            ctx.project.id,
            ctx.correlation_id,
            ctx.stage,
            stored.version,
        ))
        .await;
    if final_stage {
        ctx.events
            .publish(ProgressEvent::workflow_complete(
                ctx.project.id,
                ctx.correlation_id,
                ctx.stage,
            ))
            .await;
    }

    info!(
        project_id = %ctx.project.id,
        correlation_id = %ctx.correlation_id,
        stage = %ctx.stage,
        version = stored.version,
        attempts,
        "stage completed"
    );
}

async fn fail(ctx: &WorkerContext, fault: ServiceFault, attempts: u32) {
    warn!(
        project_id = %ctx.project.id,
        correlation_id = %ctx.correlation_id,
        stage = %ctx.stage,
        attempts,
        error = %fault,
        "stage failed"
    );

    match ctx.stores.ledger.transition(
        ctx.correlation_id,
        TransitionUpdate::failed(attempts, fault.message.clone()),
    ) {
        Ok(_) => {}
        Err(DocforgeError::InvalidTransition { .. }) => {
            discard_after_race(ctx, "failure").await;
            return;
        }
        Err(e) => {
            error!(correlation_id = %ctx.correlation_id, error = %e, "could not record failure");
            return;
        }
    }

    if let Err(e) = ctx
        .stores
        .projects
        .update(ctx.project.id, |p| p.status = ProjectStatus::Failed)
    {
        error!(project_id = %ctx.project.id, error = %e, "could not mark project failed");
    }

    ctx.events
        .publish(ProgressEvent::step_error(
            ctx.project.id,
            ctx.correlation_id,
            ctx.stage,
            fault.message,
        ))
        .await;
}

fn observed_cancel(ctx: &WorkerContext) {
    // The row was (or is being) cancelled by cancel_stage; the task only
    // has to stop. Persisted document versions stay, they are append-only.
    debug!(
        correlation_id = %ctx.correlation_id,
        stage = %ctx.stage,
        "stage task observed cancellation, stopping"
    );
}

/// The terminal transition lost a race. Against a cancellation that is the
/// expected quiet outcome; against anything else it is an invariant breach
/// and gets logged loudly.
async fn discard_after_race(ctx: &WorkerContext, action: &str) {
    match ctx.stores.ledger.find_by_correlation(ctx.correlation_id) {
        Ok(Some(row)) if row.status == ExecutionStatus::Cancelled => {
            info!(
                correlation_id = %ctx.correlation_id,
                "{action} raced a cancellation, result discarded"
            );
        }
        Ok(row) => {
            error!(
                correlation_id = %ctx.correlation_id,
                status = ?row.map(|r| r.status),
                "ledger rejected {action} outside a cancellation"
            );
        }
        Err(e) => {
            error!(
                correlation_id = %ctx.correlation_id,
                error = %e,
                "could not re-read execution after rejected {action}"
            );
        }
    }
}
