//! Shared application state for the read-path HTTP API.

use std::sync::Arc;

use catalog_core::bootstrap::services::Services;
use catalog_core::Config;

/// Everything a handler needs: the initialized service container plus the
/// top-level config (for CORS/dev-mode/metrics flags read by the router).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Services,
}

impl AppState {
    #[must_use]
    pub fn new(config: Arc<Config>, services: Services) -> Self {
        Self { config, services }
    }
}
