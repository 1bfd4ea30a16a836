use std::sync::Arc;

use tokenscope_config::AppConfig;
use tokenscope_oauth::{SessionStore, TokenClient};

/// Shared handler state: deployment config, the session store collaborator,
/// and the token endpoint client.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SessionStore>,
    pub token_client: TokenClient,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn SessionStore>) -> anyhow::Result<Self> {
        let token_client = TokenClient::new(config.request_timeout)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            token_client,
        })
    }
}
