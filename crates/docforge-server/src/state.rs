use std::path::Path;
use std::sync::Arc;

use docforge_core::config::{Config, WarnLevel};
use docforge_core::db::Stores;
use docforge_core::events::ProgressBroadcaster;
use docforge_core::orchestrator::Orchestrator;
use docforge_core::paths;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Wire the production stack from an initialized root directory:
    /// config, stores and the HTTP collaborator clients.
    pub fn from_root(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root)?;
        for warning in config.validate() {
            match warning.level {
                WarnLevel::Error => tracing::error!("config: {}", warning.message),
                WarnLevel::Warning => tracing::warn!("config: {}", warning.message),
            }
        }

        let stores = Stores::open(&paths::store_path(root))?;
        let events = Arc::new(ProgressBroadcaster::new(config.events.backlog_size));
        let (retrieval, generation) = docforge_gateway::clients_from_config(&config.services)?;
        let orchestrator = Orchestrator::new(
            stores,
            events,
            Arc::new(retrieval),
            Arc::new(generation),
            &config,
        );
        Ok(Self::new(Arc::new(orchestrator)))
    }

    pub fn stores(&self) -> &Stores {
        self.orchestrator.stores()
    }
}
