//! # Concierge Core
//!
//! Domain types, collaborator traits, and error definitions for the Concierge
//! conversational orchestrator. This crate has **no transport dependencies**:
//! it defines the model that the session store, orchestrator, providers and
//! gateway all build against.
//!
//! ## Collaborators
//!
//! The orchestrator talks to three external services, each behind a trait:
//! - [`GenerativeProvider`] — free-text completion from a prompt
//! - [`KnowledgeBase`] — structured, intent-based answers (Rasa and friends)
//! - [`ProfileSource`] — user profile lookup for personalization
//!
//! Implementations live in `concierge-providers`; tests use scripted mocks.

pub mod conversation;
pub mod error;
pub mod event;
pub mod identity;
pub mod knowledge;
pub mod policy;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationHistory, DEFAULT_HISTORY_WINDOW, Turn, normalize_query};
pub use error::{
    ERROR_MARKER, KnowledgeError, NOT_LOGGED_IN_REPLY, OrchestratorError, ProfileError,
    ProviderError, Upstream,
};
pub use event::{DomainEvent, EventBus};
pub use identity::{ProfileSource, UserId, UserProfile};
pub use knowledge::{KnowledgeBase, NO_ANSWER_FALLBACK};
pub use policy::PromptPolicy;
pub use provider::{GenerationRequest, GenerationResponse, GenerativeProvider, Usage};
