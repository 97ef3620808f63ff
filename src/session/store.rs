//! In-memory session store
//!
//! Sessions are keyed by the random id carried in the session cookie. Each
//! entry keeps the encoded `SessionState` document and an expiry that slides
//! forward whenever the session is saved.

use crate::error::{ParleyError, Result};
use crate::session::SessionState;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredSession {
    document: serde_json::Value,
    expires_at: DateTime<Utc>,
}

/// Session documents keyed by session id
///
/// Overlapping requests for the same session are not coordinated: the last
/// `save` wins.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store whose sessions live for `ttl_seconds` after their last save
    ///
    /// # Examples
    ///
    /// ```
    /// use parley::session::{SessionState, SessionStore};
    ///
    /// let store = SessionStore::new(86_400);
    /// let (id, state, created) = store.load_or_create(None).unwrap();
    /// assert!(created);
    /// assert!(state.history().is_empty());
    /// store.save(&id, &state).unwrap();
    /// assert_eq!(store.len(), 1);
    /// ```
    pub fn new(ttl_seconds: u64) -> Self {
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::days(1));
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Session lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Generate a fresh session id
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Load a session
    ///
    /// Returns `None` for unknown or expired ids. Stored documents that needed
    /// migration are written back in their cleaned form.
    pub fn load(&self, id: &str) -> Result<Option<SessionState>> {
        let now = Utc::now();
        let document = {
            let sessions = self.sessions.read().map_err(|_| {
                ParleyError::Session("Failed to acquire read lock on sessions".to_string())
            })?;
            match sessions.get(id) {
                Some(stored) if stored.expires_at > now => stored.document.clone(),
                Some(_) => {
                    drop(sessions);
                    tracing::debug!("Session {} expired", id);
                    self.remove(id)?;
                    return Ok(None);
                }
                None => return Ok(None),
            }
        };

        let (state, migrated) = SessionState::from_value(&document);
        if migrated {
            tracing::info!("Migrated stored session {} to the current format", id);
            self.save(id, &state)?;
        }
        Ok(Some(state))
    }

    /// Load the session for an optional cookie id, creating a new one when
    /// the id is missing, unknown or expired
    ///
    /// Returns the id in effect, the state, and whether the session is new.
    pub fn load_or_create(&self, id: Option<&str>) -> Result<(String, SessionState, bool)> {
        if let Some(id) = id {
            if let Some(state) = self.load(id)? {
                return Ok((id.to_string(), state, false));
            }
        }
        self.purge_expired()?;
        let id = Self::new_id();
        tracing::debug!("Created session {}", id);
        Ok((id, SessionState::new(), true))
    }

    /// Store a session and push its expiry forward
    pub fn save(&self, id: &str, state: &SessionState) -> Result<()> {
        self.insert_document(id, state.to_value())
    }

    /// Store a raw session document
    ///
    /// The document is decoded leniently on the next `load`.
    pub fn insert_document(&self, id: &str, document: serde_json::Value) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| {
            ParleyError::Session("Failed to acquire write lock on sessions".to_string())
        })?;
        sessions.insert(
            id.to_string(),
            StoredSession {
                document,
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(())
    }

    /// Forget a session
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| {
            ParleyError::Session("Failed to acquire write lock on sessions".to_string())
        })?;
        sessions.remove(id);
        Ok(())
    }

    /// Drop every expired session, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().map_err(|_| {
            ParleyError::Session("Failed to acquire write lock on sessions".to_string())
        })?;
        let before = sessions.len();
        sessions.retain(|_, stored| stored.expires_at > now);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!("Purged {} expired sessions", removed);
        }
        Ok(removed)
    }

    /// Number of stored sessions, expired ones included until purged
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether no sessions are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Role;
    use serde_json::json;

    #[test]
    fn test_unknown_id_creates_new_session() {
        let store = SessionStore::new(60);
        let (id, state, created) = store.load_or_create(Some("missing")).unwrap();
        assert!(created);
        assert_ne!(id, "missing");
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let store = SessionStore::new(60);
        let (id, mut state, _) = store.load_or_create(None).unwrap();
        state.append(Role::User, "Hello");
        store.save(&id, &state).unwrap();

        let (same_id, loaded, created) = store.load_or_create(Some(&id)).unwrap();
        assert!(!created);
        assert_eq!(same_id, id);
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new(60);
        let mut a = SessionState::new();
        a.append(Role::User, "from a");
        store.save("a", &a).unwrap();
        store.save("b", &SessionState::new()).unwrap();

        assert_eq!(store.load("a").unwrap().unwrap().history().len(), 1);
        assert!(store.load("b").unwrap().unwrap().history().is_empty());
    }

    #[test]
    fn test_load_migrates_and_persists_clean_form() {
        let store = SessionStore::new(60);
        store
            .insert_document(
                "legacy",
                json!({"history": [
                    null,
                    {"role": "user", "content": [{"type": "image_url", "image_url": {"url": "data:x"}}]}
                ]}),
            )
            .unwrap();

        let state = store.load("legacy").unwrap().unwrap();
        assert_eq!(state.history().len(), 1);

        let stored = store.sessions.read().unwrap().get("legacy").unwrap().document.clone();
        assert!(!stored.to_string().contains("data:x"));
        assert_eq!(stored["history"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_expired_session_is_not_loaded() {
        let store = SessionStore::new(60);
        store.save("old", &SessionState::new()).unwrap();
        store
            .sessions
            .write()
            .unwrap()
            .get_mut("old")
            .unwrap()
            .expires_at = Utc::now() - Duration::seconds(1);

        assert!(store.load("old").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = SessionStore::new(60);
        store.save("live", &SessionState::new()).unwrap();
        store.save("dead", &SessionState::new()).unwrap();
        store
            .sessions
            .write()
            .unwrap()
            .get_mut("dead")
            .unwrap()
            .expires_at = Utc::now() - Duration::seconds(1);

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(SessionStore::new_id(), SessionStore::new_id());
    }
}
