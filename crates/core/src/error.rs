//! Error types for the Concierge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error type; the orchestrator folds
//! them into [`OrchestratorError`] at its boundary.

use thiserror::Error;

/// Prefix that marks a reply as an error rather than a normal answer.
pub const ERROR_MARKER: &str = "⚠️ Error: ";

/// Fixed reply for requests that arrive without a user identifier.
pub const NOT_LOGGED_IN_REPLY: &str = "❌ Sorry, you are not logged in. Please log in to continue.";

/// The failure taxonomy of a single `respond` call.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("User is not authenticated")]
    Unauthenticated,

    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: Upstream, reason: String },

    #[error("{service} returned a malformed response: {reason}")]
    MalformedUpstreamResponse { service: Upstream, reason: String },
}

/// Which upstream service a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    KnowledgeBase,
    Generative,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::KnowledgeBase => write!(f, "Knowledge base"),
            Upstream::Generative => write!(f, "Generative service"),
        }
    }
}

impl OrchestratorError {
    /// Render the error as displayable text for the caller.
    ///
    /// `Unauthenticated` maps to the fixed rejection message; upstream
    /// failures carry [`ERROR_MARKER`] so they never read as a real answer.
    pub fn to_reply(&self) -> String {
        match self {
            OrchestratorError::Unauthenticated => NOT_LOGGED_IN_REPLY.to_string(),
            other => format!("{ERROR_MARKER}{other}"),
        }
    }
}

impl From<ProviderError> for OrchestratorError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MalformedResponse(reason) => OrchestratorError::MalformedUpstreamResponse {
                service: Upstream::Generative,
                reason,
            },
            other => OrchestratorError::UpstreamUnavailable {
                service: Upstream::Generative,
                reason: other.to_string(),
            },
        }
    }
}

impl From<KnowledgeError> for OrchestratorError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::MalformedResponse(reason) => OrchestratorError::MalformedUpstreamResponse {
                service: Upstream::KnowledgeBase,
                reason,
            },
            other => OrchestratorError::UpstreamUnavailable {
                service: Upstream::KnowledgeBase,
                reason: other.to_string(),
            },
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Knowledge base returned status {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProfileError {
    #[error("Profile not found for {0}")]
    NotFound(String),

    #[error("Profile service rejected the lookup: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed profile response: {0}")]
    MalformedResponse(String),
}
