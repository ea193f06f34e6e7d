//! The conversational response orchestrator.
//!
//! Every query goes through the same priority-ordered checks:
//!
//! 1. **Unauthenticated**: no user id, fixed rejection, nothing touched
//! 2. **Greeting**: a bare "hi"/"hello"/"hey" is answered locally
//! 3. **Duplicate**: a query already in the user's history is answered from it
//! 4. **Generate**: knowledge base answer + profile + history go into a
//!    prompt, the generative provider answers, the reply is sanitized and
//!    recorded
//!
//! Upstream failures in step 4 come back as error-marked text and leave the
//! history untouched.

pub mod orchestrator;
pub mod prompt;
pub mod sanitize;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use orchestrator::{Orchestrator, Reply, ReplyOutcome};
pub use prompt::PromptBuilder;
pub use sanitize::sanitize;
