//! The response orchestrator: one query in, one displayable reply out.

use crate::prompt::PromptBuilder;
use crate::sanitize::sanitize;
use concierge_config::AppConfig;
use concierge_core::conversation::{Turn, normalize_query};
use concierge_core::error::{KnowledgeError, OrchestratorError, ProviderError, Upstream};
use concierge_core::event::{DomainEvent, EventBus};
use concierge_core::identity::{ProfileSource, UserId, UserProfile};
use concierge_core::knowledge::KnowledgeBase;
use concierge_core::provider::{GenerationRequest, GenerativeProvider};
use concierge_session::{SessionStore, UserSession};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Queries answered locally instead of going to the generative service.
const GREETINGS: [&str; 3] = ["hi", "hello", "hey"];

/// Characters of a query kept in event payloads.
const QUERY_PREVIEW_CHARS: usize = 60;

/// Which path produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// No user identifier; nothing was touched
    Rejected,
    /// Answered by the greeting shortcut
    Greeting,
    /// Served from an earlier identical query
    Cached,
    /// Produced by the generative service
    Generated,
    /// An upstream call failed; the text carries the error marker
    Failed,
}

/// A reply and the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub outcome: ReplyOutcome,
}

impl Reply {
    fn new(text: impl Into<String>, outcome: ReplyOutcome) -> Self {
        Self {
            text: text.into(),
            outcome,
        }
    }
}

/// Coordinates the session store, the knowledge base, the profile source and
/// the generative provider for each query.
pub struct Orchestrator {
    /// The generative provider
    provider: Arc<dyn GenerativeProvider>,

    /// Structured answer service
    knowledge: Arc<dyn KnowledgeBase>,

    /// Optional profile lookup
    profiles: Option<Arc<dyn ProfileSource>>,

    /// Per-user histories
    sessions: Arc<SessionStore>,

    prompt: PromptBuilder,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    model: String,
    temperature: f32,
    max_tokens: Option<u32>,

    knowledge_timeout: Duration,
    generation_timeout: Duration,
    profile_timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator with default prompt settings and timeouts.
    pub fn new(
        provider: Arc<dyn GenerativeProvider>,
        knowledge: Arc<dyn KnowledgeBase>,
        sessions: Arc<SessionStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            knowledge,
            profiles: None,
            sessions,
            prompt: PromptBuilder::new("TechZiteBot", "TechZite 2025"),
            event_bus: Arc::new(EventBus::default()),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            knowledge_timeout: Duration::from_secs(15),
            generation_timeout: Duration::from_secs(60),
            profile_timeout: Duration::from_secs(10),
        }
    }

    /// Create an orchestrator with model, prompt and timeouts taken from config.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn GenerativeProvider>,
        knowledge: Arc<dyn KnowledgeBase>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self::new(provider, knowledge, sessions, config.effective_model())
            .with_prompt_builder(PromptBuilder::from_config(&config.prompt))
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_timeouts(
                config.upstream.knowledge_timeout(),
                config.upstream.generation_timeout(),
                config.upstream.profile_timeout(),
            )
    }

    pub fn with_profile_source(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_prompt_builder(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per generated reply.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the knowledge base, generation and profile timeouts.
    pub fn with_timeouts(mut self, knowledge: Duration, generation: Duration, profile: Duration) -> Self {
        self.knowledge_timeout = knowledge;
        self.generation_timeout = generation;
        self.profile_timeout = profile;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Answer a query. Never fails: errors come back as displayable text.
    pub async fn respond(&self, user_id: Option<&str>, query: &str) -> String {
        self.respond_detailed(user_id, query).await.text
    }

    /// Answer a query and report which path produced the answer.
    pub async fn respond_detailed(&self, user_id: Option<&str>, query: &str) -> Reply {
        let Some(user_id) = UserId::parse(user_id) else {
            debug!("Rejecting query without a user id");
            self.event_bus.publish(DomainEvent::QueryRejected { timestamp: Utc::now() });
            return Reply::new(OrchestratorError::Unauthenticated.to_reply(), ReplyOutcome::Rejected);
        };

        let reply = self.answer(&user_id, query).await;
        self.sessions.touch(&user_id);
        reply
    }

    async fn answer(&self, user_id: &UserId, query: &str) -> Reply {
        // Held until the reply is decided so the user's read-modify-write never interleaves
        let session = self.sessions.session(user_id);
        let mut session = session.lock().await;

        let normalized = normalize_query(query);

        if GREETINGS.contains(&normalized.as_str())
            && session.history.last().is_none_or(|last| !last.matches_query(query))
        {
            let text = format!("Hi {user_id}, I am here to assist you!");
            session.history.push(Turn::new(query, &text));
            debug!(user_id = %user_id, "Answered greeting locally");
            self.event_bus.publish(DomainEvent::GreetingAnswered {
                user_id: user_id.to_string(),
                timestamp: Utc::now(),
            });
            return Reply::new(text, ReplyOutcome::Greeting);
        }

        if let Some(previous) = session.history.find_query(query) {
            debug!(user_id = %user_id, "Serving repeated query from history");
            let text = previous.bot_response.clone();
            self.event_bus.publish(DomainEvent::CachedAnswerServed {
                user_id: user_id.to_string(),
                query_preview: preview(query),
                timestamp: Utc::now(),
            });
            return Reply::new(text, ReplyOutcome::Cached);
        }

        match self.generate(user_id, &mut session, query).await {
            Ok(text) => {
                session.history.push(Turn::new(query, &text));
                Reply::new(text, ReplyOutcome::Generated)
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Generation failed");
                let service = match &e {
                    OrchestratorError::UpstreamUnavailable { service, .. }
                    | OrchestratorError::MalformedUpstreamResponse { service, .. } => service.to_string(),
                    OrchestratorError::Unauthenticated => "identity".to_string(),
                };
                self.event_bus.publish(DomainEvent::UpstreamFailed {
                    user_id: user_id.to_string(),
                    service,
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Reply::new(e.to_reply(), ReplyOutcome::Failed)
            }
        }
    }

    /// The generate path. Leaves the history alone; the caller records the turn.
    async fn generate(
        &self,
        user_id: &UserId,
        session: &mut UserSession,
        query: &str,
    ) -> Result<String, OrchestratorError> {
        if session.profile.is_none() {
            session.profile = self.fetch_profile(user_id).await;
        }

        let answer = tokio::time::timeout(self.knowledge_timeout, self.knowledge.query(user_id.as_str(), query))
            .await
            .map_err(|_| {
                KnowledgeError::Timeout(format!("no answer within {}s", self.knowledge_timeout.as_secs()))
            })??;

        let prompt = self
            .prompt
            .build(query, session.profile.as_ref(), &session.history, &answer);

        let request = GenerationRequest {
            model: self.model.clone(),
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            user_id = %user_id,
            provider = self.provider.name(),
            model = %self.model,
            history = session.history.len(),
            "Calling generative provider"
        );

        let start = Instant::now();
        let response = tokio::time::timeout(self.generation_timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!("no reply within {}s", self.generation_timeout.as_secs()))
            })??;
        let duration_ms = start.elapsed().as_millis() as u64;

        let text = sanitize(&response.text);
        if text.trim().is_empty() {
            return Err(OrchestratorError::MalformedUpstreamResponse {
                service: Upstream::Generative,
                reason: "reply was empty after cleanup".into(),
            });
        }

        info!(user_id = %user_id, model = %response.model, duration_ms, "Generated reply");
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            user_id: user_id.to_string(),
            model: response.model,
            tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
            duration_ms,
            timestamp: Utc::now(),
        });

        Ok(text)
    }

    /// Fetch the user's profile. Failures degrade to `None` and are retried next time.
    async fn fetch_profile(&self, user_id: &UserId) -> Option<UserProfile> {
        let profiles = self.profiles.as_ref()?;

        match tokio::time::timeout(self.profile_timeout, profiles.fetch_profile(user_id)).await {
            Ok(Ok(profile)) => {
                debug!(user_id = %user_id, events = profile.events.len(), "Fetched user profile");
                Some(profile)
            }
            Ok(Err(e)) => {
                warn!(user_id = %user_id, error = %e, "Profile lookup failed, continuing without it");
                None
            }
            Err(_) => {
                warn!(user_id = %user_id, "Profile lookup timed out, continuing without it");
                None
            }
        }
    }
}

fn preview(query: &str) -> String {
    query.chars().take(QUERY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, StaticKnowledgeBase, StaticProfileSource, make_profile};
    use concierge_core::error::{ERROR_MARKER, NOT_LOGGED_IN_REPLY, ProfileError};
    use concierge_core::identity::UserId;

    struct Harness {
        provider: Arc<ScriptedProvider>,
        knowledge: Arc<StaticKnowledgeBase>,
        sessions: Arc<SessionStore>,
        orchestrator: Orchestrator,
    }

    fn harness(provider: ScriptedProvider, knowledge: StaticKnowledgeBase) -> Harness {
        let provider = Arc::new(provider);
        let knowledge = Arc::new(knowledge);
        let sessions = Arc::new(SessionStore::default());
        let orchestrator = Orchestrator::new(provider.clone(), knowledge.clone(), sessions.clone(), "mock-model");
        Harness {
            provider,
            knowledge,
            sessions,
            orchestrator,
        }
    }

    fn uid(s: &str) -> UserId {
        UserId::parse(Some(s)).unwrap()
    }

    async fn history_len(sessions: &SessionStore, user: &str) -> usize {
        sessions.peek(&uid(user)).await.map(|h| h.len()).unwrap_or(0)
    }

    #[tokio::test]
    async fn missing_user_id_is_rejected_without_side_effects() {
        let h = harness(ScriptedProvider::texts(&[]), StaticKnowledgeBase::answering("x"));

        for user in [None, Some(""), Some("   ")] {
            let reply = h.orchestrator.respond_detailed(user, "What events are available?").await;
            assert_eq!(reply.text, NOT_LOGGED_IN_REPLY);
            assert_eq!(reply.outcome, ReplyOutcome::Rejected);
        }

        assert!(h.sessions.is_empty());
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(h.knowledge.calls(), 0);
    }

    #[tokio::test]
    async fn greeting_is_answered_locally() {
        let h = harness(ScriptedProvider::texts(&[]), StaticKnowledgeBase::answering("x"));

        let reply = h.orchestrator.respond_detailed(Some("TZ-1"), " Hello ").await;
        assert_eq!(reply.text, "Hi TZ-1, I am here to assist you!");
        assert_eq!(reply.outcome, ReplyOutcome::Greeting);

        let history = h.sessions.peek(&uid("TZ-1")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.last().unwrap().user_query, " Hello ");
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(h.knowledge.calls(), 0);
    }

    #[tokio::test]
    async fn repeated_greeting_falls_through_to_history() {
        let h = harness(ScriptedProvider::texts(&[]), StaticKnowledgeBase::answering("x"));

        let first = h.orchestrator.respond_detailed(Some("TZ-1"), "hi").await;
        let second = h.orchestrator.respond_detailed(Some("TZ-1"), "HI").await;

        assert_eq!(first.outcome, ReplyOutcome::Greeting);
        assert_eq!(second.outcome, ReplyOutcome::Cached);
        assert_eq!(second.text, first.text);
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 1);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn greeting_after_another_query_greets_again() {
        let h = harness(
            ScriptedProvider::texts(&["The venue opens at 9."]),
            StaticKnowledgeBase::answering("9 AM"),
        );

        h.orchestrator.respond(Some("TZ-1"), "hey").await;
        h.orchestrator.respond(Some("TZ-1"), "When does the venue open?").await;
        let reply = h.orchestrator.respond_detailed(Some("TZ-1"), "hey").await;

        assert_eq!(reply.outcome, ReplyOutcome::Greeting);
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 3);
    }

    #[tokio::test]
    async fn duplicate_query_is_served_from_history() {
        let h = harness(
            ScriptedProvider::texts(&["Hackathon and Workshop are open."]),
            StaticKnowledgeBase::answering("Hackathon, Workshop"),
        );

        let first = h.orchestrator.respond_detailed(Some("TZ-1"), "What events?").await;
        let second = h.orchestrator.respond_detailed(Some("TZ-1"), "  what EVENTS? ").await;

        assert_eq!(first.outcome, ReplyOutcome::Generated);
        assert_eq!(second.outcome, ReplyOutcome::Cached);
        assert_eq!(second.text, "Hackathon and Workshop are open.");
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(h.knowledge.calls(), 1);
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 1);
    }

    #[tokio::test]
    async fn generated_reply_uses_profile_and_knowledge_base() {
        let h = harness(
            ScriptedProvider::texts(&["You're registered for **Hackathon**. The *Workshop* is also open."]),
            StaticKnowledgeBase::answering("Hackathon, Workshop"),
        );
        let profiles = Arc::new(StaticProfileSource::found(make_profile("TZ-7", "Ravi", &["Hackathon"])));
        let orchestrator = h.orchestrator.with_profile_source(profiles.clone());

        let reply = orchestrator.respond_detailed(Some("TZ-7"), "What events are available?").await;

        assert_eq!(reply.outcome, ReplyOutcome::Generated);
        assert!(reply.text.contains("Hackathon"));
        assert!(!reply.text.contains('*'));

        let history = h.sessions.peek(&uid("TZ-7")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.last().unwrap().bot_response, reply.text);

        let prompt = &h.provider.prompts()[0];
        assert!(prompt.contains("Registered Events: Hackathon"));
        assert!(prompt.contains("No previous conversation."));
        assert!(prompt.contains("User: What events are available?"));
        assert!(prompt.contains("Hackathon, Workshop"));

        assert_eq!(h.knowledge.queries(), vec![("TZ-7".to_string(), "What events are available?".to_string())]);
        assert_eq!(profiles.calls(), 1);
    }

    #[tokio::test]
    async fn prior_turns_feed_the_next_prompt() {
        let h = harness(
            ScriptedProvider::texts(&["It starts March 3rd.", "Hall B."]),
            StaticKnowledgeBase::answering("ok"),
        );

        h.orchestrator.respond(Some("TZ-1"), "When does it start?").await;
        h.orchestrator.respond(Some("TZ-1"), "Where is it?").await;

        let prompts = h.provider.prompts();
        assert!(prompts[1].contains("User: When does it start?\nBot: It starts March 3rd."));
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 2);
    }

    #[tokio::test]
    async fn profile_is_fetched_once_per_session() {
        let h = harness(ScriptedProvider::texts(&["a", "b"]), StaticKnowledgeBase::answering("ok"));
        let profiles = Arc::new(StaticProfileSource::found(make_profile("TZ-1", "Asha", &[])));
        let orchestrator = h.orchestrator.with_profile_source(profiles.clone());

        orchestrator.respond(Some("TZ-1"), "first").await;
        orchestrator.respond(Some("TZ-1"), "second").await;

        assert_eq!(profiles.calls(), 1);
    }

    #[tokio::test]
    async fn profile_failure_uses_placeholder_and_retries() {
        let h = harness(ScriptedProvider::texts(&["a", "b"]), StaticKnowledgeBase::answering("ok"));
        let profiles = Arc::new(StaticProfileSource::failing(ProfileError::Network("refused".into())));
        let orchestrator = h.orchestrator.with_profile_source(profiles.clone());

        let reply = orchestrator.respond_detailed(Some("TZ-1"), "first").await;
        orchestrator.respond(Some("TZ-1"), "second").await;

        assert_eq!(reply.outcome, ReplyOutcome::Generated);
        assert!(h.provider.prompts()[0].contains("User details not available."));
        assert_eq!(profiles.calls(), 2);
    }

    #[tokio::test]
    async fn generative_failure_leaves_history_unchanged() {
        let h = harness(
            ScriptedProvider::failing(ProviderError::Network("connection reset".into())),
            StaticKnowledgeBase::answering("Hackathon, Workshop"),
        );
        h.orchestrator.respond(Some("TZ-1"), "hello").await;

        let reply = h.orchestrator.respond_detailed(Some("TZ-1"), "What events?").await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed);
        assert!(reply.text.starts_with(ERROR_MARKER), "{}", reply.text);
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 1);
    }

    #[tokio::test]
    async fn knowledge_base_failure_skips_generation() {
        let h = harness(
            ScriptedProvider::texts(&[]),
            StaticKnowledgeBase::failing(KnowledgeError::ApiError {
                status_code: 502,
                message: "bad gateway".into(),
            }),
        );

        let reply = h.orchestrator.respond_detailed(Some("TZ-1"), "What events?").await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed);
        assert!(reply.text.starts_with(ERROR_MARKER));
        assert!(reply.text.contains("Knowledge base"));
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 0);
    }

    #[tokio::test]
    async fn reply_of_only_markers_is_malformed() {
        let h = harness(ScriptedProvider::texts(&["** **"]), StaticKnowledgeBase::answering("ok"));

        let reply = h.orchestrator.respond_detailed(Some("TZ-1"), "anything?").await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed);
        assert!(reply.text.contains("malformed"));
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let h = harness(
            ScriptedProvider::texts(&["too late"]).with_delay(Duration::from_secs(120)),
            StaticKnowledgeBase::answering("ok"),
        );
        let orchestrator = h.orchestrator.with_timeouts(
            Duration::from_secs(5),
            Duration::from_secs(30),
            Duration::from_secs(5),
        );

        let reply = orchestrator.respond_detailed(Some("TZ-1"), "What events?").await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed);
        assert!(reply.text.contains("timed out"), "{}", reply.text);
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_queries_generate_once() {
        let h = harness(
            ScriptedProvider::texts(&["Hall B."]).with_delay(Duration::from_secs(2)),
            StaticKnowledgeBase::answering("ok"),
        );

        let (a, b) = tokio::join!(
            h.orchestrator.respond_detailed(Some("TZ-1"), "Where is it?"),
            h.orchestrator.respond_detailed(Some("TZ-1"), "where is it?"),
        );

        let mut outcomes = [a.outcome, b.outcome];
        outcomes.sort_by_key(|o| *o as u8);
        assert_eq!(outcomes, [ReplyOutcome::Cached, ReplyOutcome::Generated]);
        assert_eq!(a.text, b.text);
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 1);
    }

    fn harness_with_idle_ttl(provider: ScriptedProvider, ttl: Duration) -> Harness {
        let provider = Arc::new(provider);
        let knowledge = Arc::new(StaticKnowledgeBase::answering("ok"));
        let sessions = Arc::new(SessionStore::default().with_idle_ttl(ttl));
        let orchestrator = Orchestrator::new(provider.clone(), knowledge.clone(), sessions.clone(), "mock-model");
        Harness {
            provider,
            knowledge,
            sessions,
            orchestrator,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_survives_generation_longer_than_idle_ttl() {
        let h = harness_with_idle_ttl(
            ScriptedProvider::texts(&["Hall C.", "unused"]).with_delay(Duration::from_secs(20)),
            Duration::from_secs(10),
        );

        let (a, b) = tokio::join!(
            h.orchestrator.respond_detailed(Some("TZ-1"), "Where is it?"),
            async {
                tokio::time::sleep(Duration::from_secs(15)).await;
                assert_eq!(h.sessions.evict_expired(), 0);
                h.orchestrator.respond_detailed(Some("TZ-1"), "where is it?").await
            },
        );

        assert_eq!(a.outcome, ReplyOutcome::Generated);
        assert_eq!(b.outcome, ReplyOutcome::Cached);
        assert_eq!(b.text, "Hall C.");
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(history_len(&h.sessions, "TZ-1").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_request_restarts_the_idle_clock() {
        let h = harness_with_idle_ttl(
            ScriptedProvider::texts(&["Hall C.", "unused"]).with_delay(Duration::from_secs(20)),
            Duration::from_secs(10),
        );

        let first = h.orchestrator.respond_detailed(Some("TZ-1"), "Where is it?").await;
        assert_eq!(first.outcome, ReplyOutcome::Generated);

        tokio::time::advance(Duration::from_secs(1)).await;
        let repeat = h.orchestrator.respond_detailed(Some("TZ-1"), "Where is it?").await;

        assert_eq!(repeat.outcome, ReplyOutcome::Cached);
        assert_eq!(repeat.text, "Hall C.");
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(h.knowledge.calls(), 1);
    }

    #[tokio::test]
    async fn users_do_not_share_history() {
        let h = harness(
            ScriptedProvider::texts(&["Answer for one.", "Answer for two."]),
            StaticKnowledgeBase::answering("ok"),
        );

        h.orchestrator.respond(Some("one"), "What events?").await;
        let reply = h.orchestrator.respond_detailed(Some("two"), "What events?").await;

        assert_eq!(reply.outcome, ReplyOutcome::Generated);
        assert_eq!(reply.text, "Answer for two.");
        assert_eq!(h.provider.calls(), 2);
    }

    #[tokio::test]
    async fn outcomes_are_published() {
        let h = harness(ScriptedProvider::texts(&["Hall B."]), StaticKnowledgeBase::answering("ok"));
        let bus = Arc::new(EventBus::new(16));
        let mut events = bus.subscribe();
        let orchestrator = h.orchestrator.with_event_bus(bus.clone());
        assert!(Arc::ptr_eq(orchestrator.event_bus(), &bus));

        orchestrator.respond(None, "hi").await;
        orchestrator.respond(Some("TZ-1"), "hi").await;
        orchestrator.respond(Some("TZ-1"), "Where?").await;
        orchestrator.respond(Some("TZ-1"), "where?").await;

        assert!(matches!(*events.recv().await.unwrap(), DomainEvent::QueryRejected { .. }));
        assert!(matches!(*events.recv().await.unwrap(), DomainEvent::GreetingAnswered { .. }));
        match &*events.recv().await.unwrap() {
            DomainEvent::ResponseGenerated { model, tokens_used, .. } => {
                assert_eq!(model, "mock-model");
                assert_eq!(*tokens_used, 15);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(*events.recv().await.unwrap(), DomainEvent::CachedAnswerServed { .. }));
    }
}
