use std::sync::Arc;

use crate::core::config::ProxyConfig;
use crate::core::db;
use crate::proxy::learner::{LearnStore, SchemaLearner};
use crate::proxy::TokenManager;

/// Shared application state.
pub struct AppState {
    pub config: ProxyConfig,
    pub http: reqwest::Client,
    pub token_manager: TokenManager,
    pub learner: Arc<SchemaLearner>,
}

impl AppState {
    pub async fn new(config: ProxyConfig) -> Result<Self, String> {
        let http = reqwest::Client::new();

        let token_manager = TokenManager::new(
            http.clone(),
            config.bloxs_base_url.clone(),
            config.bloxs_api_key.clone(),
            config.bloxs_api_secret.clone(),
        );

        // The KV is only opened when learning can actually run.
        let store = match (&config.learning_kv, config.enable_learning) {
            (Some(path), true) => Some(LearnStore::new(db::open_kv(path).await?)),
            _ => None,
        };
        let learner = Arc::new(SchemaLearner::new(config.enable_learning, store));

        Ok(Self {
            config,
            http,
            token_manager,
            learner,
        })
    }
}
