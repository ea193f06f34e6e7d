//! Configuration loading, validation, and management for Concierge.
//!
//! Loads configuration from `~/.concierge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use concierge_core::PromptPolicy;
use concierge_core::conversation::DEFAULT_HISTORY_WINDOW;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.concierge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generative provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generative provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per generated reply
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Structured knowledge-base service
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,

    /// User profile service
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Session store sizing and eviction
    #[serde(default)]
    pub session: SessionConfig,

    /// Prompt persona and instruction policies
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Upstream call timeouts
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("knowledge_base", &self.knowledge_base)
            .field("profile", &self.profile)
            .field("session", &self.session)
            .field("prompt", &self.prompt)
            .field("gateway", &self.gateway)
            .field("upstream", &self.upstream)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Base URL of the Rasa server
    #[serde(default = "default_knowledge_url")]
    pub url: String,

    /// Sender id sent with every query. Unset = use the caller's user id so
    /// each user gets their own dialogue tracker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_sender: Option<String>,
}

fn default_knowledge_url() -> String {
    "http://localhost:5005".into()
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            url: default_knowledge_url(),
            fixed_sender: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Endpoint returning user details. Unset = profiles are never fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Turns retained per user
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Users retained before least-recently-used sessions are evicted
    #[serde(default = "default_max_users")]
    pub max_users: usize,

    /// Evict sessions idle longer than this (0 = never)
    #[serde(default)]
    pub idle_ttl_secs: u64,
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}
fn default_max_users() -> usize {
    10_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_users: default_max_users(),
            idle_ttl_secs: 0,
        }
    }
}

impl SessionConfig {
    /// The idle TTL, if enabled.
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Name the assistant introduces itself with in the prompt preamble
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    /// The event the assistant serves
    #[serde(default = "default_event_name")]
    pub event_name: String,

    /// Generation instructions, rendered in this order
    #[serde(default = "PromptPolicy::defaults")]
    pub policies: Vec<PromptPolicy>,
}

fn default_assistant_name() -> String {
    "TechZiteBot".into()
}
fn default_event_name() -> String {
    "TechZite 2025".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            event_name: default_event_name(),
            policies: PromptPolicy::defaults(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Chat requests allowed per user per minute
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_rate_limit() -> usize {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_knowledge_timeout")]
    pub knowledge_timeout_secs: u64,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_profile_timeout")]
    pub profile_timeout_secs: u64,
}

fn default_knowledge_timeout() -> u64 {
    15
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_profile_timeout() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            knowledge_timeout_secs: default_knowledge_timeout(),
            generation_timeout_secs: default_generation_timeout(),
            profile_timeout_secs: default_profile_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn knowledge_timeout(&self) -> Duration {
        Duration::from_secs(self.knowledge_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.concierge/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `CONCIERGE_API_KEY` (highest priority)
    /// - `GEMINI_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("CONCIERGE_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("CONCIERGE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("CONCIERGE_MODEL") {
            self.default_model = model;
        }

        if let Some(url) = lookup("CONCIERGE_KNOWLEDGE_URL") {
            self.knowledge_base.url = url;
        }

        if let Some(url) = lookup("CONCIERGE_PROFILE_URL") {
            self.profile.url = Some(url);
        }

        if self.has_mismatched_model() {
            tracing::warn!(
                provider = %self.default_provider,
                model = %self.effective_model(),
                "Provider is not gemini but the model is a Gemini model; set CONCIERGE_MODEL too"
            );
        }
    }

    /// A non-Gemini provider paired with a Gemini model name.
    pub fn has_mismatched_model(&self) -> bool {
        self.default_provider != default_provider() && self.effective_model().starts_with("gemini")
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".concierge")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.session.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "session.history_window must be > 0".into(),
            ));
        }

        if self.session.max_users == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_users must be > 0".into(),
            ));
        }

        if self.upstream.knowledge_timeout_secs == 0
            || self.upstream.generation_timeout_secs == 0
            || self.upstream.profile_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "upstream timeouts must be > 0".into(),
            ));
        }

        if self.gateway.rate_limit_per_minute == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.rate_limit_per_minute must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// The model to request: the default provider's own model if set, else `default_model`.
    pub fn effective_model(&self) -> String {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            knowledge_base: KnowledgeBaseConfig::default(),
            profile: ProfileConfig::default(),
            session: SessionConfig::default(),
            prompt: PromptConfig::default(),
            gateway: GatewayConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.session.history_window, 10);
        assert_eq!(config.prompt.policies.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.prompt.policies, config.prompt.policies);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_history_window_rejected() {
        let mut config = AppConfig::default();
        config.session.history_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.default_provider, "gemini");
    }

    #[test]
    fn loads_partial_file_and_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_provider = "openai"
default_model = "gpt-4o-mini"

[knowledge_base]
url = "http://rasa.internal:5005"

[profile]
url = "https://users.example.com/get-user-details"

[session]
max_users = 50
idle_ttl_secs = 3600

[prompt]
policies = ["prefer_context", "suppress_greetings"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.knowledge_base.url, "http://rasa.internal:5005");
        assert_eq!(config.session.history_window, 10);
        assert_eq!(config.session.idle_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(
            config.prompt.policies,
            vec![PromptPolicy::PreferContext, PromptPolicy::SuppressGreetings]
        );
        assert_eq!(config.prompt.assistant_name, "TechZiteBot");
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[prompt]\npolicies = [\"be_funny\"]").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "GEMINI_API_KEY" => Some("g-key".into()),
            "CONCIERGE_MODEL" => Some("gemini-2.0-flash".into()),
            "CONCIERGE_PROFILE_URL" => Some("http://profiles".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.default_model, "gemini-2.0-flash");
        assert_eq!(config.profile.url.as_deref(), Some("http://profiles"));
        assert!(config.has_api_key());
    }

    #[test]
    fn provider_override_without_model_is_flagged() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "CONCIERGE_PROVIDER" => Some("openai".into()),
            _ => None,
        });
        assert_eq!(config.default_provider, "openai");
        assert!(config.has_mismatched_model());

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "CONCIERGE_PROVIDER" => Some("openai".into()),
            "CONCIERGE_MODEL" => Some("gpt-4o-mini".into()),
            _ => None,
        });
        assert!(!config.has_mismatched_model());
        assert!(!AppConfig::default().has_mismatched_model());
    }

    #[test]
    fn provider_model_overrides_default_model() {
        let mut config = AppConfig::default();
        assert_eq!(config.effective_model(), "gemini-1.5-flash");
        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("gemini-2.0-flash".into()),
            },
        );
        assert_eq!(config.effective_model(), "gemini-2.0-flash");
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("42618"));
    }
}
