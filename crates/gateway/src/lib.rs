//! HTTP API gateway for Concierge.
//!
//! Exposes the orchestrator over REST: a chat endpoint, session inspection
//! and reset, and a health check.
//!
//! Built on Axum for high performance async HTTP.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use concierge_config::AppConfig;
use concierge_core::conversation::Turn;
use concierge_core::identity::UserId;
use concierge_orchestrator::{Orchestrator, ReplyOutcome};
use concierge_session::SessionStore;

/// Header carrying the caller's user identifier.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Maximum accepted request body.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    rate_limiter: RateLimiter,
}

impl GatewayState {
    /// `rate_limit_per_minute` of 0 disables rate limiting.
    pub fn new(orchestrator: Arc<Orchestrator>, rate_limit_per_minute: usize) -> Self {
        Self {
            orchestrator,
            rate_limiter: RateLimiter::new(rate_limit_per_minute, Duration::from_secs(60)),
        }
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Request body size limit (64 KiB)
/// - Per-user sliding-window rate limit on chat
/// - CORS for browser chat widgets
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static("x-user-id"),
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/chat", post(chat_handler))
        .route(
            "/v1/sessions/{user_id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire the orchestrator and its collaborators from configuration.
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let router = concierge_providers::router::build_from_config(config);
    let provider = router
        .default()
        .ok_or("No default provider configured")?;
    let knowledge = concierge_providers::router::build_knowledge_base(config);
    let sessions = Arc::new(SessionStore::from_config(&config.session));

    let orchestrator = Orchestrator::from_config(config, provider, knowledge, sessions);
    Ok(match concierge_providers::router::build_profile_source(config) {
        Some(profiles) => orchestrator.with_profile_source(profiles),
        None => orchestrator,
    })
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("No API key configured; generation requests will fail until one is set");
    }

    let orchestrator = build_orchestrator(&config)?;
    if let Some(ttl) = config.session.idle_ttl() {
        spawn_session_sweeper(orchestrator.sessions().clone(), ttl);
    }

    let state = Arc::new(GatewayState::new(
        Arc::new(orchestrator),
        config.gateway.rate_limit_per_minute,
    ));
    let app = build_router(state);

    info!(
        addr = %addr,
        provider = %config.default_provider,
        model = %config.effective_model(),
        knowledge_base = %config.knowledge_base.url,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop sessions idle past the TTL.
fn spawn_session_sweeper(sessions: Arc<SessionStore>, ttl: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ttl.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_expired();
            if evicted > 0 {
                debug!(evicted, remaining = sessions.len(), "Swept idle sessions");
            }
        }
    });
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per user id.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: if map grows too large, evict stale entries
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub outcome: ReplyOutcome,
    pub request_id: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    // Header wins over the body field
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(payload.user_id);

    let client_key = user_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("anonymous");
    if !state.rate_limiter.check(client_key) {
        warn!(client = %client_key.chars().take(20).collect::<String>(), "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    info!(
        request_id = %request_id,
        message_len = payload.message.len(),
        "Chat message received"
    );

    let reply = state
        .orchestrator
        .respond_detailed(user_id.as_deref(), &payload.message)
        .await;

    debug!(request_id = %request_id, outcome = ?reply.outcome, "Chat reply ready");

    Ok(Json(ChatResponse {
        response: reply.text,
        outcome: reply.outcome,
        request_id,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub window: usize,
    pub turns: Vec<Turn>,
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionResponse>, StatusCode> {
    let user_id = UserId::parse(Some(&user_id)).ok_or(StatusCode::NOT_FOUND)?;
    let sessions = state.orchestrator.sessions();
    let history = sessions.peek(&user_id).await.ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(SessionResponse {
        user_id: user_id.to_string(),
        window: history.window(),
        turns: history.turns().cloned().collect(),
    }))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> StatusCode {
    let Some(user_id) = UserId::parse(Some(&user_id)) else {
        return StatusCode::NOT_FOUND;
    };

    if state.orchestrator.sessions().remove(&user_id) {
        info!(user_id = %user_id, "Session cleared");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use concierge_core::error::NOT_LOGGED_IN_REPLY;
    use concierge_orchestrator::test_helpers::{ScriptedProvider, StaticKnowledgeBase};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(replies: &[&str], rate_limit: usize) -> SharedState {
        let orchestrator = Orchestrator::new(
            Arc::new(ScriptedProvider::texts(replies)),
            Arc::new(StaticKnowledgeBase::answering("Hackathon, Workshop")),
            Arc::new(SessionStore::default()),
            "mock-model",
        );
        Arc::new(GatewayState::new(Arc::new(orchestrator), rate_limit))
    }

    fn chat_request(body: serde_json::Value, user_header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/chat")
            .header("Content-Type", "application/json");
        if let Some(user) = user_header {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(&[], 0));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = read_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn chat_greeting_via_header() {
        let app = build_router(test_state(&[], 0));

        let response = app
            .oneshot(chat_request(serde_json::json!({"message": "hello"}), Some("TZ-1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let chat: ChatResponse = read_json(response).await;
        assert_eq!(chat.response, "Hi TZ-1, I am here to assist you!");
        assert_eq!(chat.outcome, ReplyOutcome::Greeting);
        assert!(!chat.request_id.is_empty());
    }

    #[tokio::test]
    async fn header_user_id_wins_over_body() {
        let app = build_router(test_state(&[], 0));

        let response = app
            .oneshot(chat_request(
                serde_json::json!({"message": "hey", "user_id": "from-body"}),
                Some("from-header"),
            ))
            .await
            .unwrap();

        let chat: ChatResponse = read_json(response).await;
        assert_eq!(chat.response, "Hi from-header, I am here to assist you!");
    }

    #[tokio::test]
    async fn chat_without_user_is_rejected_with_200() {
        let app = build_router(test_state(&[], 0));

        let response = app
            .oneshot(chat_request(serde_json::json!({"message": "What events?"}), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let chat: ChatResponse = read_json(response).await;
        assert_eq!(chat.response, NOT_LOGGED_IN_REPLY);
        assert_eq!(chat.outcome, ReplyOutcome::Rejected);
    }

    #[tokio::test]
    async fn session_inspect_and_delete() {
        let state = test_state(&["You're in the **Hackathon**."], 0);
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(chat_request(
                serde_json::json!({"message": "What am I registered for?", "user_id": "TZ-7"}),
                None,
            ))
            .await
            .unwrap();
        let chat: ChatResponse = read_json(response).await;
        assert_eq!(chat.outcome, ReplyOutcome::Generated);
        assert_eq!(chat.response, "You're in the Hackathon.");

        let req = Request::builder()
            .uri("/v1/sessions/TZ-7")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session: SessionResponse = read_json(response).await;
        assert_eq!(session.user_id, "TZ-7");
        assert_eq!(session.window, 10);
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].bot_response, "You're in the Hackathon.");

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri("/v1/sessions/TZ-7")
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = app.oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.orchestrator.sessions().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let app = build_router(test_state(&[], 0));
        let req = Request::builder()
            .uri("/v1/sessions/nobody")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_is_rate_limited_per_user() {
        let app = build_router(test_state(&[], 2));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(chat_request(serde_json::json!({"message": "hi"}), Some("TZ-1")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(chat_request(serde_json::json!({"message": "hi"}), Some("TZ-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        // Other users are unaffected
        let response = app
            .oneshot(chat_request(serde_json::json!({"message": "hi"}), Some("TZ-2")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = build_router(test_state(&[], 0));
        let message = "x".repeat(BODY_LIMIT_BYTES + 1);

        let response = app
            .oneshot(chat_request(serde_json::json!({"message": message}), Some("TZ-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn orchestrator_builds_from_default_config() {
        let config = AppConfig::default();
        let orchestrator = build_orchestrator(&config).unwrap();
        assert_eq!(orchestrator.provider_name(), "gemini");
        assert_eq!(orchestrator.model(), config.effective_model());
        assert_eq!(orchestrator.sessions().window(), 10);
    }

    #[test]
    fn rate_limiter_sliding_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));

        let unlimited = RateLimiter::new(0, Duration::from_secs(60));
        assert!((0..100).all(|_| unlimited.check("a")));
    }
}
