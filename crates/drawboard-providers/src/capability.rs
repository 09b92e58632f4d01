//! The capability seam between the drawing loop and the outside world.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use drawboard_canvas::{CanvasEvent, DrawingAction, Point, context};

use crate::error::ProviderError;
use crate::{CompletionRequest, Credentials, LlmProvider, parse, prompt};

const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TEMPERATURE: f64 = 0.4;

/// Everything a capability sees when asked for the next action.
#[derive(Debug, Clone)]
pub struct StrokeContext {
    pub agent_name: String,
    pub cursor: Point,
    /// Display name and position of every other running cursor.
    pub other_cursors: Vec<(String, Point)>,
    /// Recent canvas history, oldest first.
    pub canvas: Vec<CanvasEvent>,
    /// User message addressed to this agent, already consumed from its session.
    pub pending_message: Option<String>,
}

/// Produces drawing actions for an agent session. Implementations may be
/// slow and may fail; a failure ends the session.
#[async_trait]
pub trait DrawingCapability: Send + Sync {
    /// Provider identifier, used for per-provider pacing.
    fn id(&self) -> &str;

    async fn next_action(&self, ctx: &StrokeContext) -> Result<DrawingAction, ProviderError>;
}

/// A capability backed by a chat model.
#[derive(Clone)]
pub struct LlmCapability {
    backend: Arc<dyn LlmProvider>,
    credentials: Credentials,
    model: String,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl LlmCapability {
    pub fn new(backend: Arc<dyn LlmProvider>, credentials: Credentials, model: impl Into<String>) -> Self {
        Self {
            backend,
            credentials,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One-shot request: turn `text` into a list of raw drawing commands.
    pub async fn commands(&self, text: &str, canvas: &[CanvasEvent]) -> Result<Vec<Value>, ProviderError> {
        let summary = context::summarize(canvas, canvas.len());
        let request = self.request(prompt::COMMANDS_SYSTEM, prompt::commands_user_message(text, &summary));
        let answer = self.backend.complete(&request, &self.credentials).await?;
        parse::parse_commands(&answer)
    }

    fn request(&self, system: &str, user: String) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            system: system.to_string(),
            user,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl DrawingCapability for LlmCapability {
    fn id(&self) -> &str {
        self.backend.id()
    }

    async fn next_action(&self, ctx: &StrokeContext) -> Result<DrawingAction, ProviderError> {
        let summary = context::summarize(&ctx.canvas, ctx.canvas.len());
        let user = prompt::stroke_user_message(
            ctx.cursor,
            &ctx.other_cursors,
            &summary,
            ctx.pending_message.as_deref(),
        );
        let request = self.request(prompt::STROKE_SYSTEM, user);

        debug!(agent = %ctx.agent_name, provider = self.backend.id(), model = %self.model, "requesting stroke");
        let answer = self.backend.complete(&request, &self.credentials).await?;
        parse::parse_stroke(&answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelApi;
    use std::sync::Mutex;

    /// Returns a fixed answer and records the last request.
    struct CannedProvider {
        answer: Result<String, u16>,
        seen: Mutex<Option<CompletionRequest>>,
    }

    impl CannedProvider {
        fn new(answer: Result<&str, u16>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(str::to_string),
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn id(&self) -> &str {
            "canned"
        }

        fn api(&self) -> ModelApi {
            ModelApi::OpenAiCompletions
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
            _credentials: &Credentials,
        ) -> Result<String, ProviderError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            match &self.answer {
                Ok(text) => Ok(text.clone()),
                Err(429) => Err(ProviderError::RateLimited {
                    provider: "canned".into(),
                }),
                Err(status) => Err(ProviderError::Upstream {
                    provider: "canned".into(),
                    status: *status,
                    body: String::new(),
                }),
            }
        }
    }

    fn ctx(pending: Option<&str>) -> StrokeContext {
        StrokeContext {
            agent_name: "Fox".into(),
            cursor: Point::new(100.0, 200.0),
            other_cursors: vec![],
            canvas: vec![],
            pending_message: pending.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_next_action_parses_stroke() {
        let provider = CannedProvider::new(Ok(r##"{"points": [{"x": 100, "y": 200}, {"x": 150, "y": 260}], "color": "#333333", "width": 4}"##));
        let capability = LlmCapability::new(provider.clone(), Credentials::Anonymous, "m1");

        let action = capability.next_action(&ctx(Some("draw a sun"))).await.unwrap();
        assert_eq!(action.terminal_point(), Some(Point::new(150.0, 260.0)));
        assert_eq!(action.color(), Some("#333333"));
        assert_eq!(capability.id(), "canned");

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.model, "m1");
        assert_eq!(seen.system, prompt::STROKE_SYSTEM);
        assert!(seen.user.contains("User said to you: draw a sun"));
        assert!(seen.user.contains("(canvas is empty)"));
    }

    #[tokio::test]
    async fn test_next_action_propagates_provider_error() {
        let provider = CannedProvider::new(Err(429));
        let capability = LlmCapability::new(provider, Credentials::Anonymous, "m1");
        let err = capability.next_action(&ctx(None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_next_action_rejects_prose() {
        let provider = CannedProvider::new(Ok("I'd love to draw!"));
        let capability = LlmCapability::new(provider, Credentials::Anonymous, "m1");
        let err = capability.next_action(&ctx(None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_commands_uses_command_prompt() {
        let provider = CannedProvider::new(Ok(r#"[{"type": "line", "x1": 0, "y1": 0, "x2": 5, "y2": 5}]"#));
        let capability = LlmCapability::new(provider.clone(), Credentials::Anonymous, "m2");
        let commands = capability.commands("a cat", &[]).await.unwrap();
        assert_eq!(commands.len(), 1);

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.system, prompt::COMMANDS_SYSTEM);
        assert!(seen.user.ends_with("User request: a cat"));
    }
}
