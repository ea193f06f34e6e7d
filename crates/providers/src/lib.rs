//! HTTP implementations of the Concierge collaborator traits.
//!
//! - Generative providers implement `concierge_core::GenerativeProvider`
//!   (Gemini, OpenAI-compatible); the router picks one from configuration.
//! - [`RasaKnowledgeBase`] implements `concierge_core::KnowledgeBase`.
//! - [`HttpProfileSource`] implements `concierge_core::ProfileSource`.

pub mod gemini;
pub mod openai_compat;
pub mod profile;
pub mod rasa;
pub mod router;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use profile::HttpProfileSource;
pub use rasa::RasaKnowledgeBase;
pub use router::ProviderRouter;
