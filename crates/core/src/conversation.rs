//! Turn and ConversationHistory domain types.
//!
//! These are the value objects that flow through the orchestrator:
//! user sends a query → orchestrator answers → the exchange is stored as a
//! [`Turn`] in the user's bounded [`ConversationHistory`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of turns retained per user unless configured otherwise.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// One query/response exchange. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// What the user asked, exactly as submitted
    pub user_query: String,

    /// What the bot answered (already sanitized)
    pub bot_response: String,

    /// When the exchange was recorded
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a new turn stamped with the current time.
    pub fn new(user_query: impl Into<String>, bot_response: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            bot_response: bot_response.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether this turn's query matches `query` ignoring case and surrounding whitespace.
    pub fn matches_query(&self, query: &str) -> bool {
        normalize_query(&self.user_query) == normalize_query(query)
    }
}

/// Normalize a query for comparison: trimmed and lowercased.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Ordered oldest-to-newest sequence of turns, capped at `window` entries.
///
/// The cap is enforced on every push by dropping from the oldest end, so
/// `len() <= window()` holds after any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    window: usize,
}

impl ConversationHistory {
    /// Create an empty history retaining at most `window` turns.
    pub fn new(window: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(window.min(64)),
            window,
        }
    }

    /// Append a turn, then trim to the most recent `window` entries.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.window {
            self.turns.pop_front();
        }
    }

    /// Turns in chronological order.
    pub fn turns(&self) -> impl DoubleEndedIterator<Item = &Turn> + ExactSizeIterator {
        self.turns.iter()
    }

    /// The most recent turn, if any.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// The first (oldest) turn whose query matches `query` case-insensitively.
    pub fn find_query(&self, query: &str) -> Option<&Turn> {
        let wanted = normalize_query(query);
        self.turns.iter().find(|t| normalize_query(&t.user_query) == wanted)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Maximum number of retained turns.
    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}
