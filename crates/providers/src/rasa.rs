//! Rasa knowledge base — the REST channel webhook.
//!
//! Rasa answers `POST /webhooks/rest/webhook` with a list of bot messages.
//! Only the first text message is used; an empty list means the assistant
//! had nothing to say, which maps to the fixed no-answer fallback.

use async_trait::async_trait;
use concierge_core::error::KnowledgeError;
use concierge_core::knowledge::{KnowledgeBase, NO_ANSWER_FALLBACK};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct RasaKnowledgeBase {
    webhook_url: String,
    fixed_sender: Option<String>,
    client: reqwest::Client,
}

impl RasaKnowledgeBase {
    /// Create a client for the Rasa server at `base_url` (e.g. `http://localhost:5005`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        let base_url = base_url.into();
        Self {
            webhook_url: format!("{}/webhooks/rest/webhook", base_url.trim_end_matches('/')),
            fixed_sender: None,
            client,
        }
    }

    /// Send every query under one sender id instead of the caller's.
    pub fn with_fixed_sender(mut self, sender: impl Into<String>) -> Self {
        self.fixed_sender = Some(sender.into());
        self
    }
}

#[async_trait]
impl KnowledgeBase for RasaKnowledgeBase {
    fn name(&self) -> &str {
        "rasa"
    }

    async fn query(&self, sender: &str, query: &str) -> Result<String, KnowledgeError> {
        let body = WebhookRequest {
            sender: self.fixed_sender.as_deref().unwrap_or(sender),
            message: query,
        };

        debug!(url = %self.webhook_url, query_len = query.len(), "Querying Rasa");

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    KnowledgeError::Timeout(e.to_string())
                } else {
                    KnowledgeError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Rasa returned error");
            return Err(KnowledgeError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| KnowledgeError::Network(e.to_string()))?;

        first_text(&raw)
    }
}

/// Extract the first text message from a webhook response body.
fn first_text(raw: &str) -> Result<String, KnowledgeError> {
    let messages: Vec<BotMessage> = serde_json::from_str(raw)
        .map_err(|e| KnowledgeError::MalformedResponse(format!("Expected a message list: {e}")))?;

    Ok(messages
        .into_iter()
        .find_map(|m| m.text.filter(|t| !t.trim().is_empty()))
        .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string()))
}

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    sender: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct BotMessage {
    #[serde(default)]
    text: Option<String>,
}
