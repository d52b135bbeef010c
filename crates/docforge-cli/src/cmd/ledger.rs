use crate::output;
use clap::Subcommand;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

#[derive(Subcommand, Debug)]
pub enum LedgerSubcommand {
    /// List a project's executions, oldest first
    List {
        /// Project id
        project: Uuid,
    },

    /// Delete terminal executions older than the retention window
    Prune {
        /// Override the configured retention window (days)
        #[arg(long)]
        days: Option<u32>,
    },
}

pub fn run(root: &Path, subcommand: LedgerSubcommand, json: bool) -> anyhow::Result<()> {
    let (config, stores) = super::open_stores(root)?;

    match subcommand {
        LedgerSubcommand::List { project } => {
            stores.projects.get(project)?;
            let executions = stores.ledger.list_for_project(project)?;
            if json {
                return output::print_json(&executions);
            }
            let rows = executions
                .iter()
                .map(|ex| {
                    vec![
                        ex.correlation_id.to_string(),
                        ex.stage.to_string(),
                        ex.status.to_string(),
                        ex.attempts.to_string(),
                        ex.started_at.to_string(),
                        ex.error_message.clone().unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            output::print_table(
                &["CORRELATION", "STAGE", "STATUS", "ATTEMPTS", "STARTED", "ERROR"],
                rows,
            );
            Ok(())
        }
        LedgerSubcommand::Prune { days } => {
            let days = days.unwrap_or(config.ledger.retention_days);
            let removed = stores
                .ledger
                .prune(Duration::from_secs(u64::from(days) * 86_400))?;
            if json {
                return output::print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("pruned {removed} execution(s) older than {days} day(s)");
            Ok(())
        }
    }
}
