//! Session storage for Concierge.
//!
//! One [`UserSession`] per user identifier, holding the bounded conversation
//! history and the last fetched profile. Sessions are evicted least recently
//! used first, and optionally after an idle timeout.

pub mod store;

pub use store::{SessionHandle, SessionStore, UserSession};
