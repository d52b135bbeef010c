use crate::output;
use clap::Subcommand;
use docforge_core::document::{DocumentKey, DocumentVersion};
use docforge_core::error::DocforgeError;
use docforge_core::types::DocumentKind;
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand, Debug)]
pub enum DocsSubcommand {
    /// List stored document series for a project
    List {
        /// Project id
        project: Uuid,
    },

    /// Print a document's content to stdout
    Show {
        /// Project id
        project: Uuid,

        /// Document type (business_analysis, engineering_standards,
        /// architecture, implementation_plan)
        kind: DocumentKind,

        /// Specific version (latest when omitted)
        #[arg(long)]
        version: Option<u64>,

        /// Epic sub-document number (implementation_plan only)
        #[arg(long)]
        epic: Option<u32>,
    },
}

pub fn run(root: &Path, subcommand: DocsSubcommand, json: bool) -> anyhow::Result<()> {
    let (_, stores) = super::open_stores(root)?;

    match subcommand {
        DocsSubcommand::List { project } => {
            stores.projects.get(project)?;

            // One row per series: the four primaries, then any epics.
            let mut series: Vec<(DocumentKey, String)> = DocumentKind::all()
                .iter()
                .map(|kind| (DocumentKey::primary(project, *kind), kind.to_string()))
                .collect();
            for epic in stores.documents.list_epics(project)? {
                series.push((
                    DocumentKey::epic(project, DocumentKind::ImplementationPlan, epic),
                    format!("{} epic {}", DocumentKind::ImplementationPlan, epic),
                ));
            }

            let mut entries = Vec::new();
            let mut rows = Vec::new();
            for (key, label) in series {
                let versions = stores.documents.list_versions(key)?;
                let Some(latest) = versions.last() else {
                    continue;
                };
                entries.push(serde_json::json!({
                    "kind": key.kind,
                    "epic": key.epic,
                    "versions": versions.len(),
                    "latest": latest.version,
                    "created_at": latest.created_at,
                }));
                rows.push(vec![
                    label,
                    versions.len().to_string(),
                    format!("v{}", latest.version),
                    latest.created_at.to_string(),
                ]);
            }

            if json {
                return output::print_json(&entries);
            }
            output::print_table(&["DOCUMENT", "VERSIONS", "LATEST", "CREATED"], rows);
            Ok(())
        }
        DocsSubcommand::Show {
            project,
            kind,
            version,
            epic,
        } => {
            stores.projects.get(project)?;

            let key = match epic {
                Some(n) => DocumentKey::epic(project, kind, n),
                None => DocumentKey::primary(project, kind),
            };
            let doc: DocumentVersion = match version {
                Some(v) => stores.documents.get_version(key, v)?,
                None => stores.documents.get_latest(key)?,
            }
            .ok_or(DocforgeError::DocumentNotFound {
                project_id: project,
                kind: kind.to_string(),
            })?;

            if json {
                return output::print_json(&doc);
            }
            print!("{}", doc.content);
            if !doc.content.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}
