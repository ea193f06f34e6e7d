//! Scripted collaborators for exercising the orchestrator without a network.
//!
//! Used by this crate's tests and by the gateway and CLI integration tests.

use async_trait::async_trait;
use concierge_core::error::{KnowledgeError, ProfileError, ProviderError};
use concierge_core::identity::{ProfileSource, UserId, UserProfile};
use concierge_core::knowledge::KnowledgeBase;
use concierge_core::provider::{GenerationRequest, GenerationResponse, GenerativeProvider, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A generative provider that returns a sequence of scripted replies.
///
/// Each call to `complete` pops the next reply and records the prompt it was
/// given. Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Replies with each text in turn.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Fails the first call with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Sleep before answering. Pair with paused tokio time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let reply = {
            self.prompts.lock().unwrap().push(request.prompt);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("ScriptedProvider: no more replies"))
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        reply.map(|text| GenerationResponse {
            text,
            model: request.model,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}

/// A knowledge base with one fixed answer (or failure) for every query.
pub struct StaticKnowledgeBase {
    answer: Result<String, KnowledgeError>,
    queries: Mutex<Vec<(String, String)>>,
}

impl StaticKnowledgeBase {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: KnowledgeError) -> Self {
        Self {
            answer: Err(error),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// `(sender, query)` pairs received, in call order.
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    fn name(&self) -> &str {
        "static"
    }

    async fn query(&self, sender: &str, query: &str) -> Result<String, KnowledgeError> {
        self.queries
            .lock()
            .unwrap()
            .push((sender.to_string(), query.to_string()));
        self.answer.clone()
    }
}

/// A profile source with one fixed result for every user.
pub struct StaticProfileSource {
    result: Result<UserProfile, ProfileError>,
    calls: Mutex<usize>,
}

impl StaticProfileSource {
    pub fn found(profile: UserProfile) -> Self {
        Self {
            result: Ok(profile),
            calls: Mutex::new(0),
        }
    }

    pub fn failing(error: ProfileError) -> Self {
        Self {
            result: Err(error),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ProfileSource for StaticProfileSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_profile(&self, _user_id: &UserId) -> Result<UserProfile, ProfileError> {
        *self.calls.lock().unwrap() += 1;
        self.result.clone()
    }
}

/// Build a profile with the given registered events.
pub fn make_profile(id: &str, name: &str, events: &[&str]) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        events: events.iter().map(|e| e.to_string()).collect(),
    }
}
