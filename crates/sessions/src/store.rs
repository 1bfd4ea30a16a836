use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use tokenscope_oauth::SessionStore;

type SessionData = HashMap<String, Value>;

fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ── FileSessionStore ────────────────────────────────────────────────────────

/// One JSON file per session under a spool directory.
///
/// A per-session mutex serializes every operation on that session, which is
/// what makes `take` a true consume-once: a duplicate browser delivery of
/// the same callback sees the key already gone. Writes go to a temp file in
/// the same directory and are renamed into place.
pub struct FileSessionStore {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating session dir {}", dir.display()))?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn path_for(&self, session_id: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(valid_session_id(session_id), "invalid session id");
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    async fn read(path: &Path) -> anyhow::Result<SessionData> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt session file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionData::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn write(path: &Path, data: &SessionData) -> anyhow::Result<()> {
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(data)?;
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("renaming into {}", path.display()))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, session_id: &str, key: &str) -> anyhow::Result<Option<Value>> {
        let path = self.path_for(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        Ok(Self::read(&path).await?.get(key).cloned())
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> anyhow::Result<()> {
        let path = self.path_for(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        let mut data = Self::read(&path).await?;
        data.insert(key.to_string(), value);
        Self::write(&path, &data).await
    }

    async fn delete(&self, session_id: &str, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        let mut data = Self::read(&path).await?;
        if data.remove(key).is_some() {
            Self::write(&path, &data).await?;
        }
        Ok(())
    }

    async fn take(&self, session_id: &str, key: &str) -> anyhow::Result<Option<Value>> {
        let path = self.path_for(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        let mut data = Self::read(&path).await?;
        let value = data.remove(key);
        if value.is_some() {
            Self::write(&path, &data).await?;
        }
        Ok(value)
    }

    async fn clear(&self, session_id: &str) -> anyhow::Result<()> {
        let path = self.path_for(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%session_id, "cleared session");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

// ── MemorySessionStore ──────────────────────────────────────────────────────

/// In-process store with the same semantics, used in tests and anywhere
/// persistence across restarts does not matter.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionData>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self
            .sessions
            .get(session_id)
            .and_then(|data| data.get(key).cloned()))
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> anyhow::Result<()> {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, session_id: &str, key: &str) -> anyhow::Result<()> {
        if let Some(mut data) = self.sessions.get_mut(session_id) {
            data.remove(key);
        }
        Ok(())
    }

    async fn take(&self, session_id: &str, key: &str) -> anyhow::Result<Option<Value>> {
        // The shard lock held by get_mut makes remove atomic.
        Ok(self
            .sessions
            .get_mut(session_id)
            .and_then(|mut data| data.remove(key)))
    }

    async fn clear(&self, session_id: &str) -> anyhow::Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();

        store.set("sid", "tokens", json!({"access_token": "at"})).await.unwrap();
        let value = store.get("sid", "tokens").await.unwrap().unwrap();
        assert_eq!(value["access_token"], "at");

        store.delete("sid", "tokens").await.unwrap();
        assert!(store.get("sid", "tokens").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSessionStore::new(dir.path()).unwrap();
            store.set("sid", "oauth_state", json!("abc")).await.unwrap();
        }
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert_eq!(
            store.get("sid", "oauth_state").await.unwrap(),
            Some(json!("abc"))
        );
    }

    #[tokio::test]
    async fn test_file_store_take_is_consume_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        store.set("sid", "oauth_state", json!("abc")).await.unwrap();

        assert_eq!(store.take("sid", "oauth_state").await.unwrap(), Some(json!("abc")));
        assert_eq!(store.take("sid", "oauth_state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_concurrent_take_yields_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileSessionStore::new(dir.path()).unwrap());
        store.set("sid", "oauth_state", json!("abc")).await.unwrap();

        let a = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.take("sid", "oauth_state").await.unwrap() }
        });
        let b = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.take("sid", "oauth_state").await.unwrap() }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_some() != b.is_some(), "exactly one taker must win");
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_traversal_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert!(store.get("../evil", "k").await.is_err());
        assert!(store.set("a/b", "k", json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        store.set("sid", "tokens", json!("x")).await.unwrap();
        store.clear("sid").await.unwrap();
        assert!(store.get("sid", "tokens").await.unwrap().is_none());
        // Clearing an absent session is not an error.
        store.clear("sid").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_take_and_clear() {
        let store = MemorySessionStore::new();
        store.set("sid", "k", json!(1)).await.unwrap();
        assert_eq!(store.take("sid", "k").await.unwrap(), Some(json!(1)));
        assert_eq!(store.take("sid", "k").await.unwrap(), None);

        store.set("sid", "k", json!(2)).await.unwrap();
        store.clear("sid").await.unwrap();
        assert!(store.get("sid", "k").await.unwrap().is_none());
    }
}
