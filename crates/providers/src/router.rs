//! Provider router, selects the chat-completion backend from config.

use smartday_config::AppConfig;
use smartday_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::openai_compat::OpenAiCompatProvider;

/// Holds the configured providers keyed by name.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// The provider named by `default_provider`.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration.
///
/// Every provider gets the chat timeout and retry budget from `[chat]`.
/// The default provider is always registered, even when it has no
/// `[providers.<name>]` table.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);
    let timeout = Duration::from_secs(config.chat.request_timeout_secs);
    let retries = config.chat.max_retries;

    let build = |name: &str, api_url: Option<&str>, api_key: Option<&str>| -> Arc<dyn Provider> {
        let base_url = api_url
            .map(str::to_string)
            .unwrap_or_else(|| default_base_url(name));
        let api_key = api_key.or(config.api_key.as_deref()).unwrap_or_default();
        Arc::new(
            OpenAiCompatProvider::new(name, base_url, api_key)
                .with_timeout(timeout)
                .with_max_retries(retries),
        )
    };

    for (name, provider_config) in &config.providers {
        let provider = build(
            name,
            provider_config.api_url.as_deref(),
            provider_config.api_key.as_deref(),
        );
        router.register(name.clone(), provider);
    }

    if router.get(&config.default_provider).is_none() {
        let provider = build(&config.default_provider, None, None);
        router.register(config.default_provider.clone(), provider);
    }

    router
}

/// Get the default base URL for well-known OpenAI-compatible providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
