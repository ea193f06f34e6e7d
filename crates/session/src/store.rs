//! In-memory session store keyed by user identifier.
//!
//! The outer map is an LRU guarded by a `std::sync::Mutex` that is only held
//! for lookups and inserts, never across an await. Each user's session sits
//! behind its own `tokio::sync::Mutex`: whoever holds that guard owns the
//! user's read-modify-write cycle, so requests for one user are serialized
//! while different users proceed in parallel.

use concierge_config::SessionConfig;
use concierge_core::conversation::{ConversationHistory, DEFAULT_HISTORY_WINDOW, Turn};
use concierge_core::identity::{UserId, UserProfile};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Everything remembered about one user.
#[derive(Debug)]
pub struct UserSession {
    /// Bounded chronological history
    pub history: ConversationHistory,

    /// Last successfully fetched profile
    pub profile: Option<UserProfile>,
}

impl UserSession {
    fn new(window: usize) -> Self {
        Self {
            history: ConversationHistory::new(window),
            profile: None,
        }
    }
}

/// Shared handle to one user's session. Lock it to serialize access.
pub type SessionHandle = Arc<tokio::sync::Mutex<UserSession>>;

struct Entry {
    session: SessionHandle,
    last_access: Instant,
}

impl Entry {
    /// A request holds a handle to this session, so it must stay in the map.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.session) > 1
    }
}

pub struct SessionStore {
    entries: Mutex<LruCache<String, Entry>>,
    window: usize,
    max_users: NonZeroUsize,
    idle_ttl: Option<Duration>,
}

impl SessionStore {
    /// Create a store retaining `window` turns per user for at most `max_users` users.
    pub fn new(window: usize, max_users: usize) -> Self {
        let capacity = NonZeroUsize::new(max_users).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            window: window.max(1),
            max_users: capacity,
            idle_ttl: None,
        }
    }

    /// Build a store from the `[session]` config section.
    pub fn from_config(config: &SessionConfig) -> Self {
        let store = Self::new(config.history_window, config.max_users);
        match config.idle_ttl() {
            Some(ttl) => store.with_idle_ttl(ttl),
            None => store,
        }
    }

    /// Drop sessions that have not been touched for `ttl`.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = Some(ttl);
        self
    }

    /// Turns retained per user.
    pub fn window(&self) -> usize {
        self.window
    }

    fn is_stale(&self, entry: &Entry, now: Instant) -> bool {
        !entry.in_use()
            && self
                .idle_ttl
                .is_some_and(|ttl| now.duration_since(entry.last_access) > ttl)
    }

    /// Evict idle users, least recently used first, until one more fits.
    ///
    /// Sessions with a request in flight are skipped; if every session is
    /// busy the map grows past `max_users` and shrinks back once they finish.
    fn make_room(&self, entries: &mut LruCache<String, Entry>) {
        while entries.len() >= self.max_users.get() {
            let idle = entries
                .iter()
                .rev()
                .find(|(_, entry)| !entry.in_use())
                .map(|(id, _)| id.clone());
            let Some(id) = idle else { break };
            entries.pop(&id);
            debug!(evicted = %id, "Session store full, evicted least recently used user");
        }

        let wanted = NonZeroUsize::new(entries.len() + 1)
            .map_or(self.max_users, |needed| needed.max(self.max_users));
        if entries.cap() != wanted {
            entries.resize(wanted);
        }
    }

    /// Get the user's session, creating an empty one on first use.
    pub fn session(&self, user_id: &UserId) -> SessionHandle {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = entries.get_mut(user_id.as_str()) {
            if !self.is_stale(entry, now) {
                entry.last_access = now;
                return entry.session.clone();
            }
            debug!(user_id = %user_id, "Session idle past TTL, starting fresh");
            entries.pop(user_id.as_str());
        }

        self.make_room(&mut entries);
        let session: SessionHandle = Arc::new(tokio::sync::Mutex::new(UserSession::new(self.window)));
        entries.push(
            user_id.to_string(),
            Entry {
                session: session.clone(),
                last_access: now,
            },
        );
        session
    }

    /// Mark the user's session as just used. Call when a request finishes.
    pub fn touch(&self, user_id: &UserId) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.peek_mut(user_id.as_str()) {
            entry.last_access = Instant::now();
        }
    }

    /// Snapshot of the user's history, registering an empty session if none exists.
    pub async fn get(&self, user_id: &UserId) -> ConversationHistory {
        let session = self.session(user_id);
        let guard = session.lock().await;
        guard.history.clone()
    }

    /// Append a turn to the user's history, trimming to the window.
    pub async fn append(&self, user_id: &UserId, turn: Turn) {
        let session = self.session(user_id);
        session.lock().await.history.push(turn);
    }

    /// Snapshot of the user's history without creating or promoting a session.
    pub async fn peek(&self, user_id: &UserId) -> Option<ConversationHistory> {
        let session = {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.peek(user_id.as_str())?.session.clone()
        };
        let guard = session.lock().await;
        Some(guard.history.clone())
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(user_id.as_str())
    }

    /// Forget a user's session. Returns whether one existed.
    pub fn remove(&self, user_id: &UserId) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop(user_id.as_str())
            .is_some()
    }

    /// Drop sessions idle longer than the TTL. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        if self.idle_ttl.is_none() {
            return 0;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| self.is_stale(entry, now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            entries.pop(id);
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "Evicted idle sessions");
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW, 10_000)
    }
}
