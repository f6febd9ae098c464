//! Session Management
//!
//! Maps a session id to its vendor-native transcript. Sessions are created
//! lazily, bumped on every turn, capped in length, and evicted after a period
//! of inactivity by a background sweep.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::Result;
use crate::history::NativeHistory;
use crate::provider::ProviderKind;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A conversation and its bookkeeping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// Vendor the transcript was built for
    pub provider: ProviderKind,

    /// Vendor-native transcript
    pub history: NativeHistory,

    /// Fresh for every session created, even under a reused id
    #[serde(default = "Uuid::new_v4")]
    pub conversation_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub last_activity_at: DateTime<Utc>,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new(id: SessionId, provider: ProviderKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            provider,
            history: NativeHistory::empty(provider),
            conversation_id: Uuid::new_v4(),
            created_at: now,
            last_activity_at: now,
            metadata: HashMap::new(),
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        // A TTL too large for chrono never expires
        chrono::Duration::from_std(ttl).is_ok_and(|ttl| now - self.last_activity_at > ttl)
    }

    /// Number of transcript turns
    pub fn turn_count(&self) -> usize {
        self.history.len()
    }
}

/// Lightweight view for listings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub provider: ProviderKind,
    pub turns: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            provider: session.provider,
            turns: session.turn_count(),
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
        }
    }
}

/// Store configuration
#[derive(Clone, Debug)]
pub struct SessionStoreConfig {
    /// Inactivity after which a session is evicted
    pub ttl: Duration,

    /// Transcript turns kept per session
    pub max_history: usize,

    /// How often the background sweep runs
    pub sweep_interval: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_history: 50,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl SessionStoreConfig {
    /// Read `SESSION_TTL_SECS`, `SESSION_MAX_HISTORY` and `SESSION_SWEEP_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        Self {
            ttl: secs("SESSION_TTL_SECS").unwrap_or(defaults.ttl),
            max_history: std::env::var("SESSION_MAX_HISTORY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_history),
            sweep_interval: secs("SESSION_SWEEP_SECS").unwrap_or(defaults.sweep_interval),
        }
    }
}

/// Session store trait
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session or create an empty one for `provider`
    async fn get_or_create(&self, id: &SessionId, provider: ProviderKind) -> Result<Session>;

    /// Load a live session
    async fn get(&self, id: &SessionId) -> Option<Session>;

    /// Replace a session's transcript, keeping only the most recent turns.
    /// Recreates the session if it was evicted in the meantime.
    async fn update_history(&self, id: &SessionId, history: NativeHistory) -> Result<()>;

    /// Bump a session's activity timestamp. Returns `false` if it is absent.
    async fn touch(&self, id: &SessionId) -> bool;

    /// Remove a session. Returns `true` if it existed.
    async fn delete(&self, id: &SessionId) -> bool;

    /// Evict every expired session, returning how many were removed
    async fn sweep_expired(&self) -> usize;

    /// Live sessions, most recently active first
    async fn list(&self) -> Vec<SessionSummary>;

    /// Exclusive access for one request on a session
    async fn lock(&self, id: &SessionId) -> OwnedMutexGuard<()>;
}

/// In-memory session store with background TTL sweep
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    /// Explicitly deleted ids and when, kept for one TTL
    deleted: Mutex<HashMap<SessionId, DateTime<Utc>>>,
    config: SessionStoreConfig,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MemorySessionStore {
    /// Store without a background sweep (call [`SessionStore::sweep_expired`] yourself)
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            deleted: Mutex::new(HashMap::new()),
            config,
            sweeper: std::sync::Mutex::new(None),
        }
    }

    /// Store with the periodic sweep running. Must be called inside a Tokio runtime.
    pub fn start(config: SessionStoreConfig) -> Arc<Self> {
        let store = Arc::new(Self::new(config));
        let handle = tokio::spawn(sweep_loop(
            Arc::downgrade(&store),
            store.config.sweep_interval,
        ));
        if let Ok(mut sweeper) = store.sweeper.lock() {
            *sweeper = Some(handle);
        }
        tracing::info!(
            ttl_secs = store.config.ttl.as_secs(),
            max_history = store.config.max_history,
            "Session store started"
        );
        store
    }

    /// Stop the background sweep
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().ok().and_then(|mut s| s.take()) {
            handle.abort();
            tracing::info!("Session store sweep stopped");
        }
    }

    pub const fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    fn expired(&self, session: &Session) -> bool {
        session.is_expired(self.config.ttl, Utc::now())
    }
}

impl Drop for MemorySessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn sweep_loop(store: Weak<MemorySessionStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // First tick completes immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };
        let evicted = store.sweep_expired().await;
        if evicted > 0 {
            tracing::info!(evicted, "Evicted expired sessions");
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(&self, id: &SessionId, provider: ProviderKind) -> Result<Session> {
        let mut sessions = self.sessions.write().await;

        if sessions.get(id).is_some_and(|s| self.expired(s)) {
            sessions.remove(id);
        }
        self.deleted.lock().await.remove(id);

        let session = sessions.entry(id.clone()).or_insert_with(|| {
            tracing::info!(session_id = %id, %provider, "Creating session");
            Session::new(id.clone(), provider)
        });
        session.touch();
        Ok(session.clone())
    }

    async fn get(&self, id: &SessionId) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(id).filter(|s| !self.expired(s)).cloned()
    }

    async fn update_history(&self, id: &SessionId, history: NativeHistory) -> Result<()> {
        let history = history.keep_recent(self.config.max_history);
        let mut sessions = self.sessions.write().await;

        if !sessions.contains_key(id) && self.deleted.lock().await.contains_key(id) {
            tracing::debug!(session_id = %id, "Session deleted mid-request, dropping update");
            return Ok(());
        }

        let session = sessions.entry(id.clone()).or_insert_with(|| {
            tracing::debug!(session_id = %id, "Session evicted mid-request, recreating");
            Session::new(id.clone(), history.kind())
        });
        session.provider = history.kind();
        session.history = history;
        session.touch();
        Ok(())
    }

    async fn touch(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) if !self.expired(session) => {
                session.touch();
                true
            }
            _ => false,
        }
    }

    async fn delete(&self, id: &SessionId) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(id).is_some();
            if removed {
                self.deleted.lock().await.insert(id.clone(), Utc::now());
            }
            removed
        };
        let mut locks = self.locks.lock().await;
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
        drop(locks);
        if removed {
            tracing::info!(session_id = %id, "Session deleted");
        }
        removed
    }

    async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.config.ttl, now));
        let evicted = before - sessions.len();

        let ttl = chrono::Duration::from_std(self.config.ttl).unwrap_or(chrono::Duration::MAX);
        self.deleted.lock().await.retain(|_, at| now - *at <= ttl);

        // Drop lock entries nobody is holding for sessions that are gone
        let mut locks = self.locks.lock().await;
        locks.retain(|id, lock| sessions.contains_key(id) || Arc::strong_count(lock) > 1);

        evicted
    }

    async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut result: Vec<SessionSummary> = sessions
            .values()
            .filter(|s| !self.expired(s))
            .map(SessionSummary::from)
            .collect();

        result.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        result
    }

    async fn lock(&self, id: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
