use crate::output;
use std::path::Path;
use uuid::Uuid;

pub fn run(root: &Path, project: Uuid, json: bool) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (_, orchestrator) = super::open_orchestrator(root)?;
        let progress = orchestrator.get_progress(project).await?;

        if json {
            return output::print_json(&progress);
        }

        println!("{}  {}", progress.project.id, progress.project.name);
        println!("  status: {}", progress.project.status);
        println!(
            "  step:   {} of {}",
            progress.project.current_step,
            progress.stages.len()
        );
        if let Some(active) = &progress.active {
            println!(
                "  active: {} ({}, attempt {})",
                active.stage, active.status, active.attempts
            );
        }
        println!();

        let rows = progress
            .stages
            .iter()
            .map(|s| {
                vec![
                    s.number.to_string(),
                    s.stage.to_string(),
                    s.state.to_string(),
                    s.latest_version
                        .map(|v| format!("v{v}"))
                        .unwrap_or_else(|| "-".to_string()),
                    s.attempts
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        output::print_table(&["#", "STAGE", "STATE", "DOC", "ATTEMPTS"], rows);
        Ok(())
    })
}
