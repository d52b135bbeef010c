use crate::output;
use anyhow::Context;
use clap::Subcommand;
use docforge_core::events::{ProgressEvent, ProgressEventKind};
use docforge_core::execution::ExecutionStatus;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

#[derive(Subcommand, Debug)]
pub enum StageSubcommand {
    /// Run a workflow stage to completion, streaming progress
    Start {
        /// Project id
        project: Uuid,

        /// Stage number (1-4)
        stage: u8,

        /// Free-form JSON payload forwarded to the generation service
        #[arg(long)]
        input: Option<String>,
    },

    /// Cancel whatever is active for a project
    Cancel {
        /// Project id
        project: Uuid,
    },
}

pub fn run(root: &Path, subcommand: StageSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        StageSubcommand::Start {
            project,
            stage,
            input,
        } => run_start(root, project, stage, input.as_deref(), json),
        StageSubcommand::Cancel { project } => run_cancel(root, project, json),
    }
}

fn run_start(
    root: &Path,
    project: Uuid,
    stage: u8,
    input: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let input: Option<serde_json::Value> = input
        .map(serde_json::from_str)
        .transpose()
        .context("--input must be valid JSON")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (_, orchestrator) = super::open_orchestrator(root)?;

        // Sweep anything a dead process left behind so its slot frees up.
        orchestrator.recover().await?;

        // Subscribe before dispatch so no event of this run is missed.
        let (_, mut rx) = orchestrator.subscribe(project).await?;
        let correlation_id = orchestrator.start_stage(project, stage, input).await?;
        if !json {
            println!("stage {stage} dispatched ({correlation_id})");
        }

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut cancel_requested = false;
        let mut events_open = true;
        let mut poll = tokio::time::interval(Duration::from_millis(150));

        // The ledger is the source of truth for termination; events are
        // display only.
        let execution = loop {
            tokio::select! {
                _ = &mut ctrl_c, if !cancel_requested => {
                    cancel_requested = true;
                    eprintln!("cancelling...");
                    orchestrator.cancel_stage(project).await?;
                }
                received = rx.recv(), if events_open => match received {
                    Ok(event) => {
                        if !json && event.correlation_id == correlation_id {
                            print_event(&event);
                        }
                    }
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => events_open = false,
                },
                _ = poll.tick() => {
                    let row = orchestrator.stores().ledger.find_by_correlation(correlation_id)?;
                    if let Some(row) = row {
                        if row.status.is_terminal() {
                            break row;
                        }
                    }
                }
            }
        };

        if !json && events_open {
            // Completion events trail the ledger write by a beat; give the
            // channel a moment to flush before the summary line.
            let grace = tokio::time::sleep(Duration::from_millis(100));
            tokio::pin!(grace);
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(event) => {
                            if event.correlation_id == correlation_id {
                                print_event(&event);
                            }
                        }
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut grace => break,
                }
            }
        }

        if json {
            output::print_json(&execution)?;
        }
        match execution.status {
            ExecutionStatus::Completed => {
                if !json {
                    println!(
                        "stage {} ({}) completed after {} attempt(s)",
                        stage,
                        execution.stage.title(),
                        execution.attempts
                    );
                }
                Ok(())
            }
            ExecutionStatus::Cancelled => {
                if !json {
                    println!("stage {stage} cancelled");
                }
                Ok(())
            }
            _ => anyhow::bail!(
                "stage {} failed: {}",
                stage,
                execution.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    })
}

fn run_cancel(root: &Path, project: Uuid, json: bool) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (_, orchestrator) = super::open_orchestrator(root)?;
        let outcome = orchestrator.cancel_stage(project).await?;
        if json {
            return output::print_json(&outcome);
        }
        match outcome.correlation_id {
            Some(correlation_id) if outcome.cancelled => {
                println!("cancelled {correlation_id}");
            }
            _ => println!("nothing active to cancel"),
        }
        Ok(())
    })
}

fn print_event(event: &ProgressEvent) {
    let label = event.kind.as_str();
    match event.kind {
        ProgressEventKind::StepComplete => {
            let version = event
                .document_version
                .map(|v| format!(" (document v{v})"))
                .unwrap_or_default();
            println!("  {label:<18} {}{version}", event.stage);
        }
        ProgressEventKind::StepError => {
            let detail = event.message.as_deref().unwrap_or("");
            println!("  {label:<18} {}: {detail}", event.stage);
        }
        _ => println!("  {label:<18} {}", event.stage),
    }
}
