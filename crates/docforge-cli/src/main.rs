mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    docs::DocsSubcommand, ledger::LedgerSubcommand, project::ProjectSubcommand,
    stage::StageSubcommand,
};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "docforge",
    about = "Staged document generation: manage projects, run workflow stages, inspect results",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .docforge/ or .git/)
    #[arg(long, global = true, env = "DOCFORGE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize docforge in the current project
    Init,

    /// Start the HTTP API server
    Serve {
        /// Port to listen on (default: from config.yaml)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        subcommand: ProjectSubcommand,
    },

    /// Run and cancel workflow stages
    Stage {
        #[command(subcommand)]
        subcommand: StageSubcommand,
    },

    /// Show stage-by-stage progress for a project
    Progress {
        /// Project id
        project: Uuid,
    },

    /// Inspect generated documents
    Docs {
        #[command(subcommand)]
        subcommand: DocsSubcommand,
    },

    /// Inspect and maintain the execution ledger
    Ledger {
        #[command(subcommand)]
        subcommand: LedgerSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Project { subcommand } => cmd::project::run(&root, subcommand, cli.json),
        Commands::Stage { subcommand } => cmd::stage::run(&root, subcommand, cli.json),
        Commands::Progress { project } => cmd::progress::run(&root, project, cli.json),
        Commands::Docs { subcommand } => cmd::docs::run(&root, subcommand, cli.json),
        Commands::Ledger { subcommand } => cmd::ledger::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
