//! Domain event system — observe orchestration outcomes without coupling.
//!
//! The orchestrator publishes one event per handled query. Observers (the
//! chat REPL in verbose mode, tests) subscribe and filter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A query arrived without a user identifier
    QueryRejected {
        timestamp: DateTime<Utc>,
    },

    /// A greeting was answered locally
    GreetingAnswered {
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A repeated query was answered from history
    CachedAnswerServed {
        user_id: String,
        query_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The generative service produced a reply
    ResponseGenerated {
        user_id: String,
        model: String,
        tokens_used: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An upstream call failed and an error reply was returned
    UpstreamFailed {
        user_id: String,
        service: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
