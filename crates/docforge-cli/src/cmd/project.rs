use crate::output;
use clap::Subcommand;
use docforge_core::{project::Project, types::Stage};
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand, Debug)]
pub enum ProjectSubcommand {
    /// Create a project
    Create {
        /// Human-readable project name
        name: String,

        /// Owning tenant id (a fresh id is minted when omitted)
        #[arg(long)]
        tenant: Option<Uuid>,
    },

    /// List projects, newest first
    List {
        /// Restrict to one tenant
        #[arg(long)]
        tenant: Option<Uuid>,
    },

    /// Show one project
    Show {
        /// Project id
        id: Uuid,
    },
}

pub fn run(root: &Path, subcommand: ProjectSubcommand, json: bool) -> anyhow::Result<()> {
    let (_, stores) = super::open_stores(root)?;

    match subcommand {
        ProjectSubcommand::Create { name, tenant } => {
            let project = Project::new(tenant.unwrap_or_else(Uuid::new_v4), name);
            stores.projects.create(&project)?;
            if json {
                output::print_json(&project)?;
            } else {
                println!("created project '{}' ({})", project.name, project.id);
            }
            Ok(())
        }
        ProjectSubcommand::List { tenant } => {
            let projects = stores.projects.list(tenant)?;
            if json {
                return output::print_json(&projects);
            }
            let rows = projects
                .iter()
                .map(|p| {
                    vec![
                        p.id.to_string(),
                        p.name.clone(),
                        p.status.to_string(),
                        p.current_step.to_string(),
                        p.tenant_id.to_string(),
                    ]
                })
                .collect();
            output::print_table(&["ID", "NAME", "STATUS", "STEP", "TENANT"], rows);
            Ok(())
        }
        ProjectSubcommand::Show { id } => {
            let project = stores.projects.get(id)?;
            if json {
                return output::print_json(&project);
            }
            println!("{}  {}", project.id, project.name);
            println!("  tenant:  {}", project.tenant_id);
            println!("  status:  {}", project.status);
            println!("  step:    {} of {}", project.current_step, Stage::all().len());
            println!("  created: {}", project.created_at);
            println!("  updated: {}", project.updated_at);
            Ok(())
        }
    }
}
