//! Session persistence.
//!
//! [`InMemorySessionStore`] suits long-lived processes; [`FileSessionStore`]
//! keeps every session in a single `sessions.json` so that separate CLI
//! invocations pick up where the last one stopped.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{A2AError, A2AResult};

use super::{Session, SessionSummary};

/// Environment variable overriding the session directory.
pub const SESSION_DIR_ENV: &str = "HANDLER_SESSION_DIR";

const SESSION_FILE: &str = "sessions.json";

/// Trait for persisting and retrieving [`Session`]s.
///
/// `save` is atomic with respect to `load`: a reader sees either the old or
/// the new session, never a mix.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Retrieve a session by id. `None` if it was never saved or was cleared.
    async fn load(&self, id: &str) -> A2AResult<Option<Session>>;

    /// Insert or replace a session.
    async fn save(&self, session: &Session) -> A2AResult<()>;

    /// Summaries of every stored session, ordered by id.
    async fn list(&self) -> A2AResult<Vec<SessionSummary>>;

    /// Remove one session, or all of them when `id` is `None`.
    async fn clear(&self, id: Option<&str>) -> A2AResult<()>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-memory session store backed by a `BTreeMap`.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<BTreeMap<String, Session>>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> A2AResult<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save(&self, session: &Session) -> A2AResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        debug!(session = %session.id, "session saved");
        Ok(())
    }

    async fn list(&self) -> A2AResult<Vec<SessionSummary>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .map(Session::summary)
            .collect())
    }

    async fn clear(&self, id: Option<&str>) -> A2AResult<()> {
        let mut sessions = self.sessions.write().await;
        match id {
            Some(id) => {
                sessions.remove(id);
            }
            None => sessions.clear(),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

/// File-backed session store.
///
/// All sessions live in `{dir}/sessions.json`, keyed by session id. Writes go
/// to a temporary file that is then renamed over the real one, so a reader
/// in another process never sees a half-written file. Writers inside this
/// process are serialized by a mutex; reads are served from a cache.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    cache: Arc<RwLock<BTreeMap<String, Session>>>,
    write_lock: Arc<Mutex<()>>,
}

impl FileSessionStore {
    /// Open (creating if needed) the store in `dir`.
    ///
    /// A corrupt or unreadable `sessions.json` is logged and treated as
    /// empty; it is overwritten on the next save.
    pub async fn new(dir: impl Into<PathBuf>) -> A2AResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            A2AError::Session(format!(
                "failed to create session directory {}: {e}",
                dir.display()
            ))
        })?;

        let store = Self {
            dir,
            cache: Arc::new(RwLock::new(BTreeMap::new())),
            write_lock: Arc::new(Mutex::new(())),
        };
        let sessions = store.read_from_disk().await;
        *store.cache.write().await = sessions;
        Ok(store)
    }

    /// Open the store in [`FileSessionStore::default_dir`].
    pub async fn open_default() -> A2AResult<Self> {
        let dir = Self::default_dir().ok_or_else(|| {
            A2AError::Session("cannot determine home directory for session storage".into())
        })?;
        Self::new(dir).await
    }

    /// `$HANDLER_SESSION_DIR` if set, else `~/.handler`.
    pub fn default_dir() -> Option<PathBuf> {
        match std::env::var_os(SESSION_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
            _ => dirs::home_dir().map(|home| home.join(".handler")),
        }
    }

    /// Directory holding the backing file.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Path of the backing file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    async fn read_from_disk(&self) -> BTreeMap<String, Session> {
        let path = self.path();
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "no session file yet");
                return BTreeMap::new();
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "failed to read session file");
                return BTreeMap::new();
            }
        };

        match serde_json::from_str::<BTreeMap<String, Session>>(&contents) {
            Ok(sessions) => {
                debug!(path = ?path, count = sessions.len(), "loaded sessions");
                sessions
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "failed to parse session file, starting empty");
                BTreeMap::new()
            }
        }
    }

    async fn write_to_disk(&self, sessions: &BTreeMap<String, Session>) -> A2AResult<()> {
        let path = self.path();
        let tmp = self.dir.join(format!("{SESSION_FILE}.tmp"));

        let json = serde_json::to_string_pretty(sessions)
            .map_err(|e| A2AError::Session(format!("failed to serialize sessions: {e}")))?;
        fs::write(&tmp, json).await.map_err(|e| {
            A2AError::Session(format!("failed to write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            A2AError::Session(format!("failed to replace {}: {e}", path.display()))
        })?;

        debug!(path = ?path, count = sessions.len(), "sessions written to disk");
        Ok(())
    }

    /// Apply `change` to a copy of the cache, persist it, then publish it.
    async fn update<F>(&self, change: F) -> A2AResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, Session>) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut next = self.cache.read().await.clone();
        change(&mut next);
        self.write_to_disk(&next).await?;
        *self.cache.write().await = next;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, id: &str) -> A2AResult<Option<Session>> {
        Ok(self.cache.read().await.get(id).cloned())
    }

    async fn save(&self, session: &Session) -> A2AResult<()> {
        let stored = session.clone();
        self.update(move |sessions| {
            sessions.insert(stored.id.clone(), stored);
        })
        .await?;
        debug!(session = %session.id, "session saved");
        Ok(())
    }

    async fn list(&self) -> A2AResult<Vec<SessionSummary>> {
        Ok(self
            .cache
            .read()
            .await
            .values()
            .map(Session::summary)
            .collect())
    }

    async fn clear(&self, id: Option<&str>) -> A2AResult<()> {
        self.update(|sessions| match id {
            Some(id) => {
                sessions.remove(id);
            }
            None => sessions.clear(),
        })
        .await?;
        match id {
            Some(id) => info!(session = %id, "cleared session"),
            None => info!("cleared all sessions"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthCredentials;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("http://a");
        session.context_id = Some("c1".into());
        store.save(&session).await.unwrap();

        let loaded = store.load("http://a").await.unwrap().unwrap();
        assert_eq!(loaded.context_id.as_deref(), Some("c1"));
        assert!(store.load("http://b").await.unwrap().is_none());

        store.save(&Session::new("http://b")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
        store.clear(Some("http://a")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        store.clear(None).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSessionStore::new(dir.path()).await.unwrap();
            let mut session =
                Session::new("http://a").with_auth(AuthCredentials::bearer("never-on-disk"));
            session.task_id = Some("t1".into());
            session.context_id = Some("c1".into());
            store.save(&session).await.unwrap();
        }

        let raw = std::fs::read_to_string(dir.path().join("sessions.json")).unwrap();
        assert!(!raw.contains("never-on-disk"));
        assert!(!dir.path().join("sessions.json.tmp").exists());

        let store = FileSessionStore::new(dir.path()).await.unwrap();
        let loaded = store.load("http://a").await.unwrap().unwrap();
        assert_eq!(loaded.task_id.as_deref(), Some("t1"));
        assert!(loaded.auth.is_none());

        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].context_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sessions.json"), "{ definitely not json").unwrap();

        let store = FileSessionStore::new(dir.path()).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());

        store.save(&Session::new("http://a")).await.unwrap();
        let reopened = FileSessionStore::new(dir.path()).await.unwrap();
        assert_eq!(reopened.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_saves_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save(&Session::new(format!("http://agent-{i}")))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reopened = FileSessionStore::new(dir.path()).await.unwrap();
        assert_eq!(reopened.list().await.unwrap().len(), 16);
    }
}
