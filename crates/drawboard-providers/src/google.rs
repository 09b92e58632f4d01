//! Google Generative AI (Gemini) provider.
//!
//! Uses the non-streaming `generateContent` endpoint. Auth is via API key in
//! the query string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, check_response};
use crate::{CompletionRequest, Credentials, LlmProvider, ModelApi};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    pub base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }
}

// --- Gemini request/response types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<serde_json::Value>,
    system_instruction: serde_json::Value,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn api(&self) -> ModelApi {
        ModelApi::GoogleGenerativeAi
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> Result<String, ProviderError> {
        let api_key = match credentials {
            Credentials::ApiKey { api_key } => api_key,
            _ => {
                return Err(ProviderError::MissingCredentials {
                    provider: self.id().into(),
                    env_hint: "GEMINI_API_KEY".into(),
                });
            }
        };

        let body = GeminiRequest {
            contents: vec![json!({ "role": "user", "parts": [{ "text": request.user }] })],
            system_instruction: json!({ "parts": [{ "text": request.system }] }),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        debug!(model = %request.model, "Calling Gemini generateContent");

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(self.id(), e))?;
        let response = check_response(self.id(), response).await?;

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        let text = candidate_text(parsed);
        if text.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "Gemini returned no text".into(),
            ));
        }
        Ok(text)
    }
}

/// Concatenated text parts of the first candidate.
fn candidate_text(response: GeminiResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = GeminiProvider::new(Some("https://proxy.example.com/"));
        assert_eq!(provider.id(), "gemini");
        assert_eq!(provider.api(), ModelApi::GoogleGenerativeAi);
        assert_eq!(provider.base_url, "https://proxy.example.com");
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"points\":"}, {"text": " []}"}]}
            }]
        }))
        .unwrap();
        assert_eq!(candidate_text(response), "{\"points\": []}");
    }

    #[test]
    fn test_request_shape() {
        let body = GeminiRequest {
            contents: vec![json!({"role": "user", "parts": [{"text": "hi"}]})],
            system_instruction: json!({"parts": [{"text": "sys"}]}),
            generation_config: GenerationConfig {
                max_output_tokens: 100,
                temperature: Some(0.4),
            },
        };
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 100);
    }
}
