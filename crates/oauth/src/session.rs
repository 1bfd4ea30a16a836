use async_trait::async_trait;
use serde_json::Value;

use crate::types::{OAuthConfig, TokenSet};

/// Session keys the flow persists between requests.
pub mod keys {
    pub const OAUTH_CONFIG: &str = "oauth_config";
    pub const OAUTH_STATE: &str = "oauth_state";
    pub const CODE_VERIFIER: &str = "code_verifier";
    pub const TOKENS: &str = "tokens";
    pub const FORM_CONFIG: &str = "form_config";
}

/// Opaque per-session key/value storage.
///
/// The flow has no knowledge of the backing implementation. Implementations
/// must make each operation atomic per session; `take` in particular is the
/// consume-once primitive that defeats duplicate callback deliveries.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str, key: &str) -> anyhow::Result<Option<Value>>;
    async fn set(&self, session_id: &str, key: &str, value: Value) -> anyhow::Result<()>;
    async fn delete(&self, session_id: &str, key: &str) -> anyhow::Result<()>;
    /// Atomically read and remove a value.
    async fn take(&self, session_id: &str, key: &str) -> anyhow::Result<Option<Value>>;
    /// Drop the whole session.
    async fn clear(&self, session_id: &str) -> anyhow::Result<()>;
}

/// The state/verifier pair persisted when an authorization request is built.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state: String,
    pub verifier: String,
}

/// Typed view of one session's flow state.
///
/// Thin glue over the store: it owns the key names and the JSON mapping,
/// nothing else.
pub struct FlowSession<'a> {
    store: &'a dyn SessionStore,
    session_id: &'a str,
}

impl<'a> FlowSession<'a> {
    pub fn new(store: &'a dyn SessionStore, session_id: &'a str) -> Self {
        Self { store, session_id }
    }

    pub async fn config(&self) -> anyhow::Result<Option<OAuthConfig>> {
        self.get_typed(keys::OAUTH_CONFIG).await
    }

    pub async fn set_config(&self, config: &OAuthConfig) -> anyhow::Result<()> {
        self.store
            .set(
                self.session_id,
                keys::OAUTH_CONFIG,
                serde_json::to_value(config)?,
            )
            .await
    }

    /// Persist the pending state/verifier pair, unconditionally replacing
    /// any pair from an earlier, unfinished attempt.
    pub async fn begin_authorization(&self, state: &str, verifier: &str) -> anyhow::Result<()> {
        self.store
            .set(self.session_id, keys::OAUTH_STATE, Value::from(state))
            .await?;
        self.store
            .set(self.session_id, keys::CODE_VERIFIER, Value::from(verifier))
            .await
    }

    /// Consume the pending pair. Returns `None` when nothing is pending —
    /// including when a duplicate callback delivery already consumed it.
    pub async fn take_pending(&self) -> anyhow::Result<Option<PendingAuthorization>> {
        let state = self.store.take(self.session_id, keys::OAUTH_STATE).await?;
        let verifier = self
            .store
            .take(self.session_id, keys::CODE_VERIFIER)
            .await?;
        match (as_string(state), as_string(verifier)) {
            (Some(state), Some(verifier)) => Ok(Some(PendingAuthorization { state, verifier })),
            _ => Ok(None),
        }
    }

    pub async fn tokens(&self) -> anyhow::Result<Option<TokenSet>> {
        self.get_typed(keys::TOKENS).await
    }

    pub async fn set_tokens(&self, tokens: &TokenSet) -> anyhow::Result<()> {
        self.store
            .set(self.session_id, keys::TOKENS, serde_json::to_value(tokens)?)
            .await
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        self.store.clear(self.session_id).await
    }

    async fn get_typed<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> anyhow::Result<Option<T>> {
        match self.store.get(self.session_id, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

fn as_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
