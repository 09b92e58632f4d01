//! OpenAI Chat Completions API provider.
//!
//! Also serves Perplexity and self-hosted OpenClaw agent gateways, which speak
//! the same protocol.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, check_response};
use crate::{CompletionRequest, Credentials, LlmProvider, ModelApi};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// API style: picks the endpoint path and auth requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
    OpenAi,
    Perplexity,
    /// Agent gateway; the bearer token is optional.
    OpenClaw,
}

pub struct OpenAiProvider {
    pub base_url: String,
    pub api_style: ApiStyle,
    provider_id: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn openai(base_url: Option<&str>) -> Self {
        Self::with_style(base_url.unwrap_or(OPENAI_BASE_URL), ApiStyle::OpenAi, "openai")
    }

    pub fn perplexity(base_url: Option<&str>) -> Self {
        Self::with_style(
            base_url.unwrap_or(PERPLEXITY_BASE_URL),
            ApiStyle::Perplexity,
            "perplexity",
        )
    }

    /// An OpenClaw gateway has no public default; the caller supplies its URL.
    pub fn openclaw(base_url: &str) -> Self {
        Self::with_style(base_url, ApiStyle::OpenClaw, "openclaw")
    }

    fn with_style(base_url: &str, api_style: ApiStyle, id: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_style,
            provider_id: id.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        match self.api_style {
            ApiStyle::Perplexity => format!("{}/chat/completions", self.base_url),
            ApiStyle::OpenAi | ApiStyle::OpenClaw => {
                format!("{}/v1/chat/completions", self.base_url)
            }
        }
    }
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.provider_id
    }

    fn api(&self) -> ModelApi {
        ModelApi::OpenAiCompletions
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> Result<String, ProviderError> {
        let bearer = match credentials {
            Credentials::ApiKey { api_key } => Some(api_key.as_str()),
            Credentials::Token { token } => Some(token.as_str()),
            Credentials::Anonymous if self.api_style == ApiStyle::OpenClaw => None,
            Credentials::Anonymous => {
                return Err(ProviderError::MissingCredentials {
                    provider: self.provider_id.clone(),
                    env_hint: format!("{}_API_KEY", self.provider_id.to_uppercase()),
                });
            }
        };

        let body = OpenAiRequest {
            model: request.model.clone(),
            messages: vec![
                json!({ "role": "system", "content": request.system }),
                json!({ "role": "user", "content": request.user }),
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %body.model, base_url = %self.base_url, "Calling OpenAI-compatible API");

        let mut req_builder = self
            .client
            .post(self.endpoint())
            .header("content-type", "application/json");
        if let Some(token) = bearer {
            req_builder = req_builder.header("authorization", format!("Bearer {token}"));
        }

        let response = req_builder
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(&self.provider_id, e))?;
        let response = check_response(&self.provider_id, response).await?;

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in completion".into()))
    }
}
