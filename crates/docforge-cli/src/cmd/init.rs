use anyhow::Context;
use docforge_core::{config::Config, db::Stores, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing docforge in: {}", root.display());

    io::ensure_dir(&paths::docforge_dir(root))
        .with_context(|| format!("failed to create {}", paths::DOCFORGE_DIR))?;

    let config_path = paths::config_path(root);
    if !config_path.exists() {
        let cfg = Config::default();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    let store_path = paths::store_path(root);
    let existed = store_path.exists();
    Stores::open(&store_path).context("failed to open store")?;
    if existed {
        println!("  exists:  {}", paths::STORE_FILE);
    } else {
        println!("  created: {}", paths::STORE_FILE);
    }

    // The store is machine state, never something to commit.
    io::ensure_gitignore_entry(root, paths::STORE_FILE)?;

    for warning in Config::load(root)?.validate() {
        println!("  warning: {}", warning.message);
    }

    println!();
    println!("docforge initialized.");
    println!("Next: docforge project create \"My Project\"");

    Ok(())
}
