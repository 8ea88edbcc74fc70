//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use classlens_core::ClassLensConfig;
use classlens_llm::{LLMConfig, LlmClient};
use classlens_resolve::ResolutionService;
use classlens_store::SqliteStore;
use parking_lot::RwLock;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ClassLensConfig,
    pub store: Arc<SqliteStore>,
    pub resolver: Arc<ResolutionService>,
    pub llm_config: RwLock<LLMConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ClassLensConfig, store: SqliteStore) -> Self {
        let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
        Self::with_llm_config(config, store, llm_config)
    }

    pub fn with_llm_config(
        config: ClassLensConfig,
        store: SqliteStore,
        llm_config: LLMConfig,
    ) -> Self {
        let resolver = ResolutionService::new(config.policy);
        Self {
            config,
            store: Arc::new(store),
            resolver: Arc::new(resolver),
            llm_config: RwLock::new(llm_config),
            started_at: Instant::now(),
        }
    }

    /// Client for the currently configured provider, if any.
    pub fn llm_client(&self) -> Option<LlmClient> {
        LlmClient::from_config(&self.llm_config.read())
    }
}
