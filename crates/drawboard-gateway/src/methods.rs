//! Gateway method handlers, shared by the WebSocket `req` frames and the REST routes.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use drawboard_agent::SessionError;
use drawboard_canvas::{CanvasEvent, DrawingAction, ErrorShape, ServerMessage, ValidationError};
use drawboard_providers::{LlmCapability, ProviderError, StartOverrides};

use crate::rate_limit::RateLimiter;
use crate::state::GatewayState;

pub const INVALID_PARAMS: &str = "invalid_params";
pub const VALIDATION_ERROR: &str = "validation_error";
pub const CLEAR_DISABLED: &str = "clear_disabled";
pub const UNKNOWN_AGENT: &str = "unknown_agent";
pub const ALREADY_RUNNING: &str = "already_running";
pub const PROVIDER_ERROR: &str = "provider_error";
pub const RATE_LIMITED: &str = "rate_limited";
pub const NOT_FOUND: &str = "not_found";

/// Agent id recorded on events submitted directly rather than by a session.
pub const EXTERNAL_AGENT_ID: &str = "external";

/// Provider used when a registered agent is started without naming one.
pub const REGISTERED_AGENT_PROVIDER: &str = "openclaw";

pub type MethodResult = Result<Value, ErrorShape>;

/// Dispatch a method request and return its payload or error.
pub async fn dispatch_method(
    state: &Arc<GatewayState>,
    ip: IpAddr,
    method: &str,
    params: Value,
) -> MethodResult {
    debug!(method, %ip, "Dispatching method");

    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let result = dispatch_method_inner(state, ip, method, params).await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_request(method, start.elapsed().as_secs_f64(), result.is_ok());

    result
}

async fn dispatch_method_inner(
    state: &Arc<GatewayState>,
    ip: IpAddr,
    method: &str,
    params: Value,
) -> MethodResult {
    match method {
        "agent.register" => handle_agent_register(state, ip, params),
        "agent.start" => handle_agent_start(state, ip, params),
        "agent.stop" => handle_agent_stop(state, params),
        "agent.message" => handle_agent_message(state, params),
        "agent.status" => Ok(json!({ "agents": state.agents.status() })),
        "canvas.snapshot" => Ok(json!({ "events": state.log.snapshot() })),
        "canvas.draw" => handle_canvas_draw(state, params),
        "canvas.ask" => handle_canvas_ask(state, ip, params).await,
        _ => Err(ErrorShape::new(NOT_FOUND, format!("Unknown method: {method}"))),
    }
}

/// HTTP status for an error code on the REST surface.
pub fn http_status(code: &str) -> StatusCode {
    match code {
        INVALID_PARAMS | VALIDATION_ERROR => StatusCode::BAD_REQUEST,
        CLEAR_DISABLED => StatusCode::FORBIDDEN,
        UNKNOWN_AGENT | NOT_FOUND => StatusCode::NOT_FOUND,
        ALREADY_RUNNING => StatusCode::CONFLICT,
        RATE_LIMITED => StatusCode::TOO_MANY_REQUESTS,
        PROVIDER_ERROR => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================
// Agent methods
// ============================================================

#[derive(Deserialize)]
struct RegisterParams {
    #[serde(default, alias = "ai_name")]
    name: Option<String>,
}

fn handle_agent_register(state: &Arc<GatewayState>, ip: IpAddr, params: Value) -> MethodResult {
    limit(&state.limits.register, ip)?;
    let params: RegisterParams = parse(params)?;
    let agent = state.agents.register(params.name.as_deref().unwrap_or_default());
    Ok(json!({
        "agent_id": agent.agent_id,
        "name": agent.name,
        "created_at": agent.created_at.to_rfc3339(),
    }))
}

#[derive(Deserialize)]
struct StartParams {
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    ai_name: Option<String>,
    #[serde(default)]
    ai_provider: Option<String>,
    #[serde(flatten)]
    overrides: StartOverrides,
}

fn handle_agent_start(state: &Arc<GatewayState>, ip: IpAddr, params: Value) -> MethodResult {
    limit(&state.limits.start, ip)?;
    let params: StartParams = parse(params)?;

    let (agent_id, provider) = match (non_blank(&params.agent_id), non_blank(&params.ai_name)) {
        (Some(id), _) => (
            Some(id),
            non_blank(&params.ai_provider).unwrap_or(REGISTERED_AGENT_PROVIDER),
        ),
        (None, Some(_)) => (None, required(&params.ai_provider, "ai_provider")?),
        (None, None) => {
            return Err(ErrorShape::new(INVALID_PARAMS, "agent_id or ai_name is required"));
        }
    };

    // resolve before registering so a bad provider leaves no ad-hoc agent behind
    let capability = state
        .providers
        .resolve(provider, &params.overrides)
        .map_err(provider_error)?;

    let agent_id = match (agent_id, non_blank(&params.ai_name)) {
        (Some(id), _) => id.to_string(),
        (None, name) => state.agents.register(name.unwrap_or_default()).agent_id,
    };

    let session = state
        .agents
        .start(&agent_id, Arc::new(capability))
        .map_err(session_error)?;
    Ok(json!(session))
}

#[derive(Deserialize)]
struct TargetParams {
    #[serde(default)]
    ai_id: Option<String>,
    #[serde(default)]
    ai_name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn handle_agent_stop(state: &Arc<GatewayState>, params: Value) -> MethodResult {
    let params: TargetParams = parse(params)?;
    let stopped = match (non_blank(&params.ai_id), non_blank(&params.ai_name)) {
        (Some(id), _) => {
            if state.agents.stop(id) {
                vec![id.to_string()]
            } else {
                vec![]
            }
        }
        (None, Some(name)) => state.agents.stop_by_name(name),
        (None, None) => return Err(ErrorShape::new(INVALID_PARAMS, "ai_id or ai_name is required")),
    };
    Ok(json!({ "stopped": stopped }))
}

fn handle_agent_message(state: &Arc<GatewayState>, params: Value) -> MethodResult {
    let params: TargetParams = parse(params)?;
    let text = required(&params.message, "message")?;
    let target = non_blank(&params.ai_id)
        .or_else(|| non_blank(&params.ai_name))
        .ok_or_else(|| ErrorShape::new(INVALID_PARAMS, "ai_id or ai_name is required"))?;

    let delivered = state.agents.deliver_message(target, text);
    if delivered == 0 {
        debug!(to = %target, "message for an agent that is not running dropped");
    }
    Ok(json!({ "delivered": delivered }))
}

// ============================================================
// Canvas methods
// ============================================================

#[derive(Deserialize)]
struct DrawParams {
    #[serde(default)]
    ai_name: Option<String>,
    action: Value,
}

fn handle_canvas_draw(state: &Arc<GatewayState>, params: Value) -> MethodResult {
    let params: DrawParams = parse(params)?;
    let name = non_blank(&params.ai_name).unwrap_or("Human");
    let action = drawboard_canvas::validate(&params.action).map_err(validation_error)?;
    let event = append_and_broadcast(state, action, EXTERNAL_AGENT_ID, name).map_err(validation_error)?;
    Ok(json!({ "event": event }))
}

#[derive(Deserialize)]
struct AskParams {
    prompt: String,
    #[serde(default)]
    ai_name: Option<String>,
    ai_provider: String,
    #[serde(flatten)]
    overrides: StartOverrides,
}

/// One-shot: the provider turns the prompt into a batch of actions which are
/// appended one by one with stroke pacing. `clear` and invalid entries are
/// skipped.
async fn handle_canvas_ask(state: &Arc<GatewayState>, ip: IpAddr, params: Value) -> MethodResult {
    limit(&state.limits.ask, ip)?;
    let params: AskParams = parse(params)?;
    if params.prompt.trim().is_empty() {
        return Err(ErrorShape::new(INVALID_PARAMS, "prompt is required"));
    }
    let capability: LlmCapability = state
        .providers
        .resolve(&params.ai_provider, &params.overrides)
        .map_err(provider_error)?;
    let name = non_blank(&params.ai_name).unwrap_or(params.ai_provider.as_str());

    let canvas = state.log.recent(state.agents.settings().context_events);
    let commands = capability
        .commands(&params.prompt, &canvas)
        .await
        .map_err(provider_error)?;

    let pace = state.agents.settings().stroke_interval;
    let mut drawn = 0usize;
    let mut skipped = 0usize;
    for raw in commands {
        let action = match drawboard_canvas::validate(&raw) {
            Ok(DrawingAction::Clear) => {
                skipped += 1;
                continue;
            }
            Ok(action) => action,
            Err(e) => {
                debug!(error = %e, "skipping invalid ask command");
                skipped += 1;
                continue;
            }
        };
        if drawn > 0 {
            tokio::time::sleep(pace).await;
        }
        match append_and_broadcast(state, action, EXTERNAL_AGENT_ID, name) {
            Ok(_) => drawn += 1,
            Err(_) => skipped += 1,
        }
    }

    info!(name, drawn, skipped, "ask completed");
    Ok(json!({ "drawn": drawn, "skipped": skipped }))
}

/// Append through the event log and broadcast the event in one step.
pub fn append_and_broadcast(
    state: &GatewayState,
    action: DrawingAction,
    agent_id: &str,
    agent_name: &str,
) -> Result<CanvasEvent, ValidationError> {
    state.viewers.publish(|| match state.log.append(action, agent_id, agent_name) {
        Ok(event) => (vec![ServerMessage::for_event(event.clone())], Ok(event)),
        Err(e) => (vec![], Err(e)),
    })
}

// ============================================================
// Helpers
// ============================================================

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, ErrorShape> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params)
        .map_err(|e| ErrorShape::new(INVALID_PARAMS, format!("Invalid params: {e}")))
}

fn limit(limiter: &RateLimiter, ip: IpAddr) -> Result<(), ErrorShape> {
    if limiter.check(ip) {
        Ok(())
    } else {
        Err(ErrorShape::new(RATE_LIMITED, "Too many requests, try again in a minute"))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ErrorShape> {
    non_blank(value).ok_or_else(|| ErrorShape::new(INVALID_PARAMS, format!("{field} is required")))
}

fn validation_error(e: ValidationError) -> ErrorShape {
    match e {
        ValidationError::ClearDisabled => ErrorShape::new(CLEAR_DISABLED, e.to_string()),
        other => ErrorShape::new(VALIDATION_ERROR, other.to_string()),
    }
}

fn session_error(e: SessionError) -> ErrorShape {
    match e {
        SessionError::UnknownAgent(_) => ErrorShape::new(UNKNOWN_AGENT, e.to_string()),
        SessionError::AlreadyRunning(_) => ErrorShape::new(ALREADY_RUNNING, e.to_string()),
    }
}

fn provider_error(e: ProviderError) -> ErrorShape {
    match e {
        ProviderError::UnknownProvider(_)
        | ProviderError::MissingCredentials { .. }
        | ProviderError::MissingBaseUrl { .. } => ErrorShape::new(INVALID_PARAMS, e.to_string()),
        other => ErrorShape::new(PROVIDER_ERROR, other.to_string()),
    }
}
