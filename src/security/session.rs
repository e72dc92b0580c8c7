//! Per-client session storage.
//!
//! The session store is the only mutable state shared between requests.
//! It holds the CSRF token and flash messages.
//!
//! # Design Decisions
//! - A session exists in the store only once something is written to it
//! - Sessions idle past the timeout read as empty and are dropped by the sweeper
//! - `replace_if` checks and writes under one entry lock, so two requests on
//!   the same session cannot both win a compare

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

/// Key-value storage scoped by session id.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str, key: &str) -> Option<String>;
    fn set(&self, session_id: &str, key: &str, value: String);
    fn remove(&self, session_id: &str, key: &str) -> Option<String>;

    /// Store `value` under `key` if `accept` approves the current value
    /// (`None` when absent). The check and the write are atomic.
    fn replace_if(&self, session_id: &str, key: &str, accept: &dyn Fn(Option<&str>) -> bool, value: String) -> bool;

    /// Drop expired sessions, returning how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Debug)]
struct SessionData {
    values: HashMap<String, String>,
    last_access: Instant,
}

impl SessionData {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            last_access: Instant::now(),
        }
    }

    fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_access.elapsed() >= idle_timeout
    }
}

/// Process-local session store with idle expiry.
#[derive(Debug)]
pub struct MemorySessionStore {
    inner: DashMap<String, SessionData>,
    idle_timeout: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(Duration::from_secs(1800))
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            idle_timeout,
        }
    }

    /// Number of sessions held, expired or not.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Live entry for `session_id`, refreshed. An expired entry is cleared
    /// first so it reads as a fresh session.
    fn live_entry(&self, session_id: &str) -> Entry<'_, String, SessionData> {
        let mut entry = self.inner.entry(session_id.to_string());
        if let Entry::Occupied(ref mut occupied) = entry {
            let data = occupied.get_mut();
            if data.is_expired(self.idle_timeout) {
                data.values.clear();
            }
            data.last_access = Instant::now();
        }
        entry
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str, key: &str) -> Option<String> {
        let mut data = self.inner.get_mut(session_id)?;
        if data.is_expired(self.idle_timeout) {
            data.values.clear();
        }
        data.last_access = Instant::now();
        data.values.get(key).cloned()
    }

    fn set(&self, session_id: &str, key: &str, value: String) {
        self.live_entry(session_id)
            .or_insert_with(SessionData::new)
            .values
            .insert(key.to_string(), value);
    }

    fn remove(&self, session_id: &str, key: &str) -> Option<String> {
        let mut data = self.inner.get_mut(session_id)?;
        if data.is_expired(self.idle_timeout) {
            data.values.clear();
        }
        data.last_access = Instant::now();
        data.values.remove(key)
    }

    fn replace_if(&self, session_id: &str, key: &str, accept: &dyn Fn(Option<&str>) -> bool, value: String) -> bool {
        match self.live_entry(session_id) {
            Entry::Occupied(mut occupied) => {
                let data = occupied.get_mut();
                if !accept(data.values.get(key).map(String::as_str)) {
                    return false;
                }
                data.values.insert(key.to_string(), value);
                true
            }
            Entry::Vacant(vacant) => {
                if !accept(None) {
                    return false;
                }
                vacant.insert(SessionData::new()).values.insert(key.to_string(), value);
                true
            }
        }
    }

    fn purge_expired(&self) -> usize {
        let before = self.inner.len();
        self.inner
            .retain(|_, data| !data.is_expired(self.idle_timeout) && !data.values.is_empty());
        before.saturating_sub(self.inner.len())
    }
}

/// Periodically purge expired sessions until shutdown.
pub async fn run_sweeper(store: Arc<dyn SessionStore>, every: Duration, mut shutdown: broadcast::Receiver<()>) {
    tracing::debug!(interval_secs = every.as_secs(), "Session sweeper starting");

    let mut ticker = time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = store.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "Expired sessions purged");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Session sweeper stopping");
                break;
            }
        }
    }
}

/// Handle to one client's session.
#[derive(Clone)]
pub struct Session {
    id: String,
    store: Arc<dyn SessionStore>,
}

const FLASH_PREFIX: &str = "flash.";

impl Session {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(&self.id, key)
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.store.set(&self.id, key, value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.store.remove(&self.id, key)
    }

    /// Atomic compare-and-write, see [`SessionStore::replace_if`].
    pub fn replace_if(&self, key: &str, accept: impl Fn(Option<&str>) -> bool, value: impl Into<String>) -> bool {
        self.store.replace_if(&self.id, key, &accept, value.into())
    }

    /// Store a message for the next request.
    pub fn set_flash(&self, key: &str, message: impl Into<String>) {
        self.set(&format!("{}{}", FLASH_PREFIX, key), message);
    }

    /// Read a flash message once.
    pub fn take_flash(&self, key: &str) -> Option<String> {
        self.remove(&format!("{}{}", FLASH_PREFIX, key))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}
