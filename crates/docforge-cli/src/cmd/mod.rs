pub mod docs;
pub mod init;
pub mod ledger;
pub mod progress;
pub mod project;
pub mod serve;
pub mod stage;

use docforge_core::config::Config;
use docforge_core::db::Stores;
use docforge_core::events::ProgressBroadcaster;
use docforge_core::orchestrator::Orchestrator;
use docforge_core::paths;
use std::path::Path;
use std::sync::Arc;

/// Open the store under `root`. Fails with the `init` hint when the root
/// holds no config.
pub(crate) fn open_stores(root: &Path) -> anyhow::Result<(Config, Stores)> {
    let config = Config::load(root)?;
    let stores = Stores::open(&paths::store_path(root))?;
    Ok((config, stores))
}

/// Wire the full orchestrator stack from on-disk config, the same way the
/// server does at startup.
pub(crate) fn open_orchestrator(root: &Path) -> anyhow::Result<(Config, Arc<Orchestrator>)> {
    let (config, stores) = open_stores(root)?;
    let events = Arc::new(ProgressBroadcaster::new(config.events.backlog_size));
    let (retrieval, generation) = docforge_gateway::clients_from_config(&config.services)?;
    let orchestrator = Orchestrator::new(
        stores,
        events,
        Arc::new(retrieval),
        Arc::new(generation),
        &config,
    );
    Ok((config, Arc::new(orchestrator)))
}
