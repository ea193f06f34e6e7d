//! KnowledgeBase trait — the structured, intent-based answer service.
//!
//! The knowledge base is treated as an opaque oracle: a free-text query goes
//! in, a best-effort textual answer comes out. Its answer is fed into the
//! prompt as a guide for the generative service.

use async_trait::async_trait;
use crate::error::KnowledgeError;

/// Answer used when the knowledge base responds with nothing to say.
pub const NO_ANSWER_FALLBACK: &str = "I don't have an answer for that.";

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// The backend name (e.g., "rasa").
    fn name(&self) -> &str;

    /// Ask the knowledge base about `query` on behalf of `sender`.
    ///
    /// An empty answer set is not an error: implementations return
    /// [`NO_ANSWER_FALLBACK`] instead.
    async fn query(&self, sender: &str, query: &str) -> std::result::Result<String, KnowledgeError>;
}
