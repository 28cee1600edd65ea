//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use chatrelay_core::{AssistantsApi, ChatRelay};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Run-lifecycle bridge to the assistant service.
    pub relay: ChatRelay,
    /// Cancelled on shutdown; every request works under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, api: Arc<dyn AssistantsApi>) -> Self {
        let relay = ChatRelay::new(Arc::new(config.relay_config()), api);
        Self {
            config: Arc::new(config),
            relay,
            shutdown: CancellationToken::new(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("shutting_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
