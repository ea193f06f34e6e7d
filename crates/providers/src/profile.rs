//! HTTP profile source — looks up user details by identifier.
//!
//! The user service takes `POST {"teckzite_id": "<id>"}` and answers with
//! either the profile fields or `{"error": "..."}`.

use async_trait::async_trait;
use concierge_core::error::ProfileError;
use concierge_core::identity::{ProfileSource, UserId, UserProfile};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct HttpProfileSource {
    url: String,
    client: reqwest::Client,
}

impl HttpProfileSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_profile(&self, user_id: &UserId) -> Result<UserProfile, ProfileError> {
        debug!(user_id = %user_id, "Fetching user profile");

        let response = self
            .client
            .post(&self.url)
            .json(&ProfileRequest {
                teckzite_id: user_id.as_str(),
            })
            .send()
            .await
            .map_err(|e| ProfileError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProfileError::NotFound(user_id.to_string()));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| ProfileError::Network(e.to_string()))?;

        parse_profile(user_id, &raw)
    }
}

fn parse_profile(user_id: &UserId, raw: &str) -> Result<UserProfile, ProfileError> {
    let body: ProfileResponse =
        serde_json::from_str(raw).map_err(|e| ProfileError::MalformedResponse(e.to_string()))?;

    if let Some(error) = body.error {
        return Err(ProfileError::Rejected(error));
    }

    Ok(UserProfile {
        id: body.teckzite_id.unwrap_or_else(|| user_id.to_string()),
        name: body
            .name
            .ok_or_else(|| ProfileError::MalformedResponse("missing name".into()))?,
        email: body.email.unwrap_or_default(),
        events: body.events,
    })
}

#[derive(Debug, Serialize)]
struct ProfileRequest<'a> {
    teckzite_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    teckzite_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    events: Vec<String>,
}
