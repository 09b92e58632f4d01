//! Drawing providers.
//!
//! A [`DrawingCapability`] turns canvas context into the next drawing action.
//! [`LlmCapability`] implements it on top of any [`LlmProvider`] chat backend
//! (OpenAI-compatible, Anthropic, Gemini); [`ProviderRegistry`] resolves a
//! provider id and credentials into a ready capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod anthropic;
pub mod capability;
pub mod error;
pub mod google;
pub mod openai;
pub mod parse;
pub mod prompt;
pub mod registry;

pub use capability::{DrawingCapability, LlmCapability, StrokeContext};
pub use error::ProviderError;
pub use registry::{ProviderRegistry, StartOverrides};

/// Supported chat API protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelApi {
    AnthropicMessages,
    OpenAiCompletions,
    GoogleGenerativeAi,
}

/// Credentials for authenticating with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credentials {
    #[serde(rename = "api_key")]
    ApiKey { api_key: String },
    /// Bearer token for self-hosted gateways.
    #[serde(rename = "token")]
    Token { token: String },
    /// No authentication; only self-hosted gateways accept this.
    #[serde(rename = "none")]
    Anonymous,
}

/// A single-turn chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

/// A chat backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g., "openai", "claude").
    fn id(&self) -> &str;

    /// API protocol used by this provider.
    fn api(&self) -> ModelApi;

    /// Run one completion and return the assistant text.
    async fn complete(
        &self,
        request: &CompletionRequest,
        credentials: &Credentials,
    ) -> Result<String, ProviderError>;
}
