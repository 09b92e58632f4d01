//! Resolve a provider id plus per-start overrides into a ready capability.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use drawboard_core::config::{Config, ProviderConfig, conventional_key_env};

use crate::anthropic::AnthropicProvider;
use crate::capability::LlmCapability;
use crate::error::ProviderError;
use crate::google::GeminiProvider;
use crate::openai::OpenAiProvider;
use crate::{Credentials, LlmProvider};

/// Provider ids accepted by [`ProviderRegistry::resolve`].
pub const PROVIDER_IDS: [&str; 5] = ["openai", "claude", "gemini", "perplexity", "openclaw"];

/// Values a caller may supply when starting an agent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartOverrides {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Model used when neither the caller nor the config names one.
pub fn default_model(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        "openai" => Some("gpt-4o-mini"),
        "claude" => Some("claude-3-5-haiku-20241022"),
        "gemini" => Some("gemini-2.0-flash"),
        "perplexity" => Some("llama-3.1-sonar-small-128k-online"),
        "openclaw" => Some("openclaw:main"),
        _ => None,
    }
}

/// Map aliases onto the canonical provider id.
pub fn canonical_id(id: &str) -> Option<&'static str> {
    match id.trim().to_ascii_lowercase().as_str() {
        "openai" | "chatgpt" => Some("openai"),
        "claude" | "anthropic" => Some("claude"),
        "gemini" | "google" => Some("gemini"),
        "perplexity" => Some("perplexity"),
        "openclaw" => Some("openclaw"),
        _ => None,
    }
}

pub struct ProviderRegistry {
    configured: HashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn from_config(config: &Config) -> Self {
        let configured = config
            .models
            .as_ref()
            .and_then(|m| m.providers.as_ref())
            .map(|providers| {
                providers
                    .iter()
                    .filter_map(|p| canonical_id(&p.id).map(|id| (id.to_string(), p.clone())))
                    .collect()
            })
            .unwrap_or_default();
        Self { configured }
    }

    /// Build the capability for `provider_id`. Fails before any network call
    /// when the provider is unknown or lacks credentials.
    pub fn resolve(
        &self,
        provider_id: &str,
        overrides: &StartOverrides,
    ) -> Result<LlmCapability, ProviderError> {
        let id = canonical_id(provider_id)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_id.to_string()))?;
        let configured = self.configured.get(id);

        let api_key = non_empty(&overrides.api_key).or_else(|| match configured {
            Some(p) => p.resolve_api_key(),
            None => conventional_key_env(id)
                .and_then(|var| std::env::var(var).ok())
                .filter(|v| !v.is_empty()),
        });
        let base_url = non_empty(&overrides.base_url)
            .or_else(|| configured.and_then(|p| p.base_url.clone()))
            .or_else(|| {
                (id == "openclaw")
                    .then(|| std::env::var("OPENCLAW_BASE_URL").ok())
                    .flatten()
                    .filter(|v| !v.trim().is_empty())
            });
        let model = non_empty(&overrides.model)
            .or_else(|| configured.and_then(|p| p.default_model.clone()))
            .or_else(|| default_model(id).map(str::to_string))
            .unwrap_or_default();

        let backend: Arc<dyn LlmProvider> = match id {
            "openai" => Arc::new(OpenAiProvider::openai(base_url.as_deref())),
            "perplexity" => Arc::new(OpenAiProvider::perplexity(base_url.as_deref())),
            "claude" => Arc::new(AnthropicProvider::new(base_url.as_deref())),
            "gemini" => Arc::new(GeminiProvider::new(base_url.as_deref())),
            "openclaw" => {
                let url = base_url.ok_or_else(|| ProviderError::MissingBaseUrl {
                    provider: id.to_string(),
                })?;
                Arc::new(OpenAiProvider::openclaw(&url))
            }
            other => return Err(ProviderError::UnknownProvider(other.to_string())),
        };

        let credentials = match (api_key, id) {
            (Some(token), "openclaw") => Credentials::Token { token },
            (None, "openclaw") => Credentials::Anonymous,
            (Some(api_key), _) => Credentials::ApiKey { api_key },
            (None, _) => {
                return Err(ProviderError::MissingCredentials {
                    provider: id.to_string(),
                    env_hint: conventional_key_env(id).unwrap_or("an API key").to_string(),
                });
            }
        };

        debug!(provider = id, model = %model, "resolved drawing provider");
        Ok(LlmCapability::new(backend, credentials, model))
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
