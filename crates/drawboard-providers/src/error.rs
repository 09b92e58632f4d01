use thiserror::Error;

/// Longest upstream body excerpt kept in an error.
const BODY_EXCERPT: usize = 500;

/// Failures of a drawing provider. Every variant ends the session that hit it.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("{provider} needs an API key (set {env_hint} or pass api_key)")]
    MissingCredentials { provider: String, env_hint: String },

    #[error("{provider} needs a base URL")]
    MissingBaseUrl { provider: String },

    #[error("[401] {provider} rejected the credentials")]
    Unauthorized { provider: String },

    #[error("[429] {provider} rate limit reached, stopping")]
    RateLimited { provider: String },

    #[error("[{status}] {provider} error: {body}")]
    Upstream {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    pub fn transport(provider: &str, source: reqwest::Error) -> Self {
        ProviderError::Transport {
            provider: provider.to_string(),
            source,
        }
    }
}

/// Map a non-2xx response onto the error taxonomy.
pub(crate) async fn check_response(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let provider = provider.to_string();
    match status.as_u16() {
        401 | 403 => Err(ProviderError::Unauthorized { provider }),
        429 => Err(ProviderError::RateLimited { provider }),
        code => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Upstream {
                provider,
                status: code,
                body: excerpt(&body, BODY_EXCERPT),
            })
        }
    }
}

/// First `max` characters of `text`, marked when cut.
pub(crate) fn excerpt(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
