//! Provider router — selects the generative provider from config, and builds
//! the other collaborators the orchestrator needs.

use std::collections::HashMap;
use std::sync::Arc;
use concierge_core::identity::ProfileSource;
use concierge_core::knowledge::KnowledgeBase;
use concierge_core::provider::GenerativeProvider;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::profile::HttpProfileSource;
use crate::rasa::RasaKnowledgeBase;

/// Routes generation requests to the configured provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn GenerativeProvider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn GenerativeProvider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn GenerativeProvider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerativeProvider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &concierge_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        router.register(
            name.clone(),
            make_provider(name, &api_key, provider_config.api_url.as_deref()),
        );
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        router.register(
            config.default_provider.clone(),
            make_provider(&config.default_provider, &api_key, None),
        );
    }

    router
}

fn make_provider(name: &str, api_key: &str, api_url: Option<&str>) -> Arc<dyn GenerativeProvider> {
    if name == "gemini" {
        let provider = GeminiProvider::new(api_key);
        match api_url {
            Some(url) => Arc::new(provider.with_base_url(url)),
            None => Arc::new(provider),
        }
    } else {
        let base_url = api_url
            .map(str::to_string)
            .unwrap_or_else(|| default_base_url(name));
        Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
    }
}

/// Build the Rasa knowledge base client from configuration.
pub fn build_knowledge_base(config: &concierge_config::AppConfig) -> Arc<dyn KnowledgeBase> {
    let kb = RasaKnowledgeBase::new(&config.knowledge_base.url, config.upstream.knowledge_timeout());
    match &config.knowledge_base.fixed_sender {
        Some(sender) => Arc::new(kb.with_fixed_sender(sender)),
        None => Arc::new(kb),
    }
}

/// Build the profile source, if a profile URL is configured.
pub fn build_profile_source(config: &concierge_config::AppConfig) -> Option<Arc<dyn ProfileSource>> {
    config.profile.url.as_ref().map(|url| {
        Arc::new(HttpProfileSource::new(url, config.upstream.profile_timeout())) as Arc<dyn ProfileSource>
    })
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_config::{AppConfig, ProviderConfig};

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));

        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }

    #[test]
    fn default_config_builds_gemini() {
        let router = build_from_config(&AppConfig::default());
        let provider = router.default().unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn configured_openai_compat_provider_is_registered() {
        let mut config = AppConfig::default();
        config.default_provider = "ollama".into();
        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://gpu-box:11434/v1".into()),
                default_model: None,
            },
        );
        let router = build_from_config(&config);
        assert_eq!(router.default().unwrap().name(), "ollama");
        assert_eq!(router.list().len(), 1);
    }

    #[test]
    fn profile_source_requires_url() {
        let mut config = AppConfig::default();
        assert!(build_profile_source(&config).is_none());
        config.profile.url = Some("http://users/get-user-details".into());
        assert!(build_profile_source(&config).is_some());
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }
}
