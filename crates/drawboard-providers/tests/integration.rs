//! Provider integration tests.
//!
//! The mock-server tests always run. Real API calls are skipped when the
//! corresponding API key env var is not set.
//! Run with: `cargo test -p drawboard-providers --test integration`

use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::json;

use drawboard_canvas::Point;
use drawboard_providers::anthropic::AnthropicProvider;
use drawboard_providers::google::GeminiProvider;
use drawboard_providers::openai::OpenAiProvider;
use drawboard_providers::{
    CompletionRequest, Credentials, DrawingCapability, LlmCapability, LlmProvider, ProviderError,
    StrokeContext,
};

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.is_empty())
}

/// Serve `router` on a random local port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn request(model: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        system: "You are a helpful assistant. Follow instructions exactly.".into(),
        user: "Reply with exactly the word 'hello'.".into(),
        max_tokens: 50,
        temperature: Some(0.0),
    }
}

fn stroke_context() -> StrokeContext {
    StrokeContext {
        agent_name: "Fox".into(),
        cursor: Point::new(500.0, 500.0),
        other_cursors: vec![],
        canvas: vec![],
        pending_message: Some("draw a short horizontal line".into()),
    }
}

#[tokio::test]
async fn test_openclaw_gateway_stroke() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            axum::Json(json!({
                "choices": [{"message": {"role": "assistant", "content":
                    "```json\n{\"points\": [{\"x\": 500, \"y\": 500}, {\"x\": 700, \"y\": 500}], \"color\": \"#112233\", \"width\": 4}\n```"}}]
            }))
        }),
    );
    let base = serve(router).await;

    let backend = std::sync::Arc::new(OpenAiProvider::openclaw(&base));
    let capability = LlmCapability::new(backend, Credentials::Anonymous, "openclaw:main");
    let action = capability.next_action(&stroke_context()).await.unwrap();
    assert_eq!(action.terminal_point(), Some(Point::new(700.0, 500.0)));
    assert_eq!(action.color(), Some("#112233"));
}

#[tokio::test]
async fn test_status_mapping() {
    let router = Router::new()
        .route("/401/v1/chat/completions", post(|| async { StatusCode::UNAUTHORIZED }))
        .route("/429/v1/chat/completions", post(|| async { StatusCode::TOO_MANY_REQUESTS }))
        .route(
            "/502/v1/chat/completions",
            post(|| async { (StatusCode::BAD_GATEWAY, "tunnel down") }),
        );
    let base = serve(router).await;
    let token = Credentials::Token {
        token: "secret".into(),
    };

    let err = OpenAiProvider::openclaw(&format!("{base}/401"))
        .complete(&request("m"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unauthorized { .. }));

    let err = OpenAiProvider::openclaw(&format!("{base}/429"))
        .complete(&request("m"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited { .. }));

    let err = OpenAiProvider::openclaw(&format!("{base}/502"))
        .complete(&request("m"), &token)
        .await
        .unwrap_err();
    match err {
        ProviderError::Upstream { status, body, .. } => {
            assert_eq!(status, 502);
            assert_eq!(body, "tunnel down");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_gateway_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = OpenAiProvider::openclaw(&format!("http://{addr}"))
        .complete(&request("m"), &Credentials::Anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport { .. }));
}

/// Run a simple completion and verify we get text back.
async fn verify_simple_completion(provider: &dyn LlmProvider, credentials: &Credentials, model: &str) {
    let text = provider.complete(&request(model), credentials).await;
    assert!(text.is_ok(), "Completion failed: {:?}", text.err());
    let text = text.unwrap();
    assert!(
        text.to_lowercase().contains("hello"),
        "Expected 'hello' in response, got: {text}"
    );
}

#[tokio::test]
async fn test_anthropic_completion() {
    let Some(api_key) = env_key("ANTHROPIC_API_KEY") else {
        eprintln!("Skipping: ANTHROPIC_API_KEY not set");
        return;
    };

    let provider = AnthropicProvider::new(None);
    let credentials = Credentials::ApiKey { api_key };
    verify_simple_completion(&provider, &credentials, "claude-3-5-haiku-20241022").await;
}

#[tokio::test]
async fn test_openai_completion() {
    let Some(api_key) = env_key("OPENAI_API_KEY") else {
        eprintln!("Skipping: OPENAI_API_KEY not set");
        return;
    };

    let provider = OpenAiProvider::openai(None);
    let credentials = Credentials::ApiKey { api_key };
    verify_simple_completion(&provider, &credentials, "gpt-4o-mini").await;
}

#[tokio::test]
async fn test_gemini_completion() {
    let Some(api_key) = env_key("GEMINI_API_KEY") else {
        eprintln!("Skipping: GEMINI_API_KEY not set");
        return;
    };

    let provider = GeminiProvider::new(None);
    let credentials = Credentials::ApiKey { api_key };
    verify_simple_completion(&provider, &credentials, "gemini-2.0-flash").await;
}

#[tokio::test]
async fn test_openai_stroke() {
    let Some(api_key) = env_key("OPENAI_API_KEY") else {
        eprintln!("Skipping: OPENAI_API_KEY not set");
        return;
    };

    let backend = std::sync::Arc::new(OpenAiProvider::openai(None));
    let capability = LlmCapability::new(backend, Credentials::ApiKey { api_key }, "gpt-4o-mini");
    let action = capability.next_action(&stroke_context()).await;
    assert!(action.is_ok(), "Stroke failed: {:?}", action.err());
}
