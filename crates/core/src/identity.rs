//! Identity — who is asking, and what we know about them.
//!
//! Authentication happens upstream; by the time a query reaches the
//! orchestrator the caller either has a stable user identifier or it does
//! not. Profiles are fetched on demand through a [`ProfileSource`] and are
//! treated as immutable snapshots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProfileError;

/// A non-blank user identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Parse a raw identifier. Absent or blank input yields `None`.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let trimmed = raw?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snapshot of a user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The identifier this profile was fetched for
    pub id: String,

    /// Display name
    pub name: String,

    /// Contact email
    pub email: String,

    /// Registered event names, in registration order
    #[serde(default)]
    pub events: Vec<String>,
}

/// Source of user profiles (an HTTP user service in production).
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// The source name (e.g., "http").
    fn name(&self) -> &str;

    /// Fetch the current profile for `user_id`.
    async fn fetch_profile(&self, user_id: &UserId) -> std::result::Result<UserProfile, ProfileError>;
}
