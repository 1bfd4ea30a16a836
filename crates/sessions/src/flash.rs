use serde::{Deserialize, Serialize};
use serde_json::Value;

use tokenscope_oauth::SessionStore;

const FLASH_KEY: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

/// One-shot message queued for the next page render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

/// Append a message to the session's flash queue.
pub async fn push(
    store: &dyn SessionStore,
    session_id: &str,
    level: FlashLevel,
    text: impl Into<String>,
) -> anyhow::Result<()> {
    let mut queue: Vec<FlashMessage> = match store.get(session_id, FLASH_KEY).await? {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };
    queue.push(FlashMessage {
        level,
        text: text.into(),
    });
    store
        .set(session_id, FLASH_KEY, serde_json::to_value(queue)?)
        .await
}

/// Remove and return all queued messages.
pub async fn drain(
    store: &dyn SessionStore,
    session_id: &str,
) -> anyhow::Result<Vec<FlashMessage>> {
    match store.take(session_id, FLASH_KEY).await? {
        Some(Value::Array(values)) => Ok(values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}
