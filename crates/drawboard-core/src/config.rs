//! Configuration loading and validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level Drawboard configuration, read from a JSON5 file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<AgentsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Messages queued per viewer before it is treated as a slow consumer and dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
}

fn default_port() -> u16 {
    8000
}

fn default_outbound_buffer() -> usize {
    1024
}

/// Smallest viewer queue that holds the handshake (`sync` then `cursors`).
pub const MIN_OUTBOUND_BUFFER: usize = 2;

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: None,
            outbound_buffer: default_outbound_buffer(),
            rate_limit: None,
        }
    }
}

/// Per-IP request limits over a sliding one-minute window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_start_per_minute")]
    pub start_per_minute: u32,

    #[serde(default = "default_ask_per_minute")]
    pub ask_per_minute: u32,

    #[serde(default = "default_register_per_minute")]
    pub register_per_minute: u32,
}

fn default_start_per_minute() -> u32 {
    10
}

fn default_ask_per_minute() -> u32 {
    30
}

fn default_register_per_minute() -> u32 {
    30
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            start_per_minute: default_start_per_minute(),
            ask_per_minute: default_ask_per_minute(),
            register_per_minute: default_register_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Accept `clear` actions. Off by default: the canvas is shared, so a
    /// single participant must not be able to wipe everyone's work.
    #[serde(default)]
    pub allow_clear: bool,
}

/// Pacing for the autonomous drawing loops.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Pause between two strokes of the same agent (default: 300).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_interval_ms: Option<u64>,

    /// Pause between replayed path segments when `segment_paths` is on (default: 90).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_delay_ms: Option<u64>,

    /// Replay paths as consecutive line segments, moving the cursor point by point.
    #[serde(default)]
    pub segment_paths: bool,

    /// Extra pause after a white (eraser) stroke (default: 2000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erase_cooldown_ms: Option<u64>,

    /// How many recent events are summarized for the provider (default: 50).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_events: Option<usize>,

    /// Additional per-provider pause between strokes, e.g. `{ "gemini": 60000 }`.
    #[serde(default)]
    pub provider_cooldown_ms: HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<ProviderConfig>>,
}

/// Configuration for a single drawing provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key: `api_key`, then `api_key_env`, then the
    /// provider's conventional environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        let fallback = self
            .api_key_env
            .clone()
            .or_else(|| conventional_key_env(&self.id).map(str::to_string));
        resolve_secret_field(&self.api_key, &fallback)
    }
}

/// Gemini's free tier allows roughly one request per minute.
fn default_provider_cooldown_ms(provider_id: &str) -> u64 {
    match provider_id {
        "gemini" | "google" => 60_000,
        _ => 0,
    }
}

/// Environment variable conventionally holding the key for a provider id.
pub fn conventional_key_env(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        "openai" => Some("OPENAI_API_KEY"),
        "claude" | "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "perplexity" => Some("PERPLEXITY_API_KEY"),
        "openclaw" => Some("OPENCLAW_API_KEY"),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "drawboard_agent=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        json5::from_str(&substituted)
            .map_err(|e| crate::error::DrawboardError::Config(e.to_string()))
    }

    /// Default config file location.
    pub fn config_dir() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or_else(default_port)
    }

    pub fn bind_addr(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn outbound_buffer(&self) -> usize {
        self.gateway
            .as_ref()
            .map(|g| g.outbound_buffer)
            .unwrap_or_else(default_outbound_buffer)
    }

    pub fn rate_limits(&self) -> RateLimitConfig {
        self.gateway
            .as_ref()
            .and_then(|g| g.rate_limit.clone())
            .unwrap_or_default()
    }

    pub fn allow_clear(&self) -> bool {
        self.canvas.as_ref().is_some_and(|c| c.allow_clear)
    }

    pub fn stroke_interval_ms(&self) -> u64 {
        self.agents
            .as_ref()
            .and_then(|a| a.stroke_interval_ms)
            .unwrap_or(300)
    }

    pub fn point_delay_ms(&self) -> u64 {
        self.agents
            .as_ref()
            .and_then(|a| a.point_delay_ms)
            .unwrap_or(90)
    }

    pub fn erase_cooldown_ms(&self) -> u64 {
        self.agents
            .as_ref()
            .and_then(|a| a.erase_cooldown_ms)
            .unwrap_or(2000)
    }

    pub fn context_events(&self) -> usize {
        self.agents
            .as_ref()
            .and_then(|a| a.context_events)
            .unwrap_or(50)
    }

    pub fn segment_paths(&self) -> bool {
        self.agents.as_ref().is_some_and(|a| a.segment_paths)
    }

    /// Extra pause configured for a provider, in milliseconds.
    pub fn provider_cooldown_ms(&self, provider_id: &str) -> u64 {
        self.agents
            .as_ref()
            .and_then(|a| a.provider_cooldown_ms.get(provider_id).copied())
            .unwrap_or_else(|| default_provider_cooldown_ms(provider_id))
    }

    /// Find a provider config by ID.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.models
            .as_ref()
            .and_then(|m| m.providers.as_ref())
            .and_then(|ps| ps.iter().find(|p| p.id == id))
    }

    /// Validate the config. Returns `(warnings, errors)`.
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(providers) = self.models.as_ref().and_then(|m| m.providers.as_ref()) {
            for p in providers {
                if p.id != "openclaw" && p.resolve_api_key().is_none() {
                    warnings.push(format!(
                        "Provider '{}' has no API key (set api_key, api_key_env or {})",
                        p.id,
                        conventional_key_env(&p.id).unwrap_or("an env var")
                    ));
                }
                if p.id == "openclaw" && p.base_url.is_none() {
                    warnings.push(
                        "Provider 'openclaw' has no base_url; agents must supply their own".into(),
                    );
                }
            }
        }

        if let Some(gw) = &self.gateway {
            if gw.outbound_buffer < MIN_OUTBOUND_BUFFER {
                errors.push(format!(
                    "gateway.outbound_buffer must be at least {MIN_OUTBOUND_BUFFER}"
                ));
            }
            if let Some(rl) = &gw.rate_limit {
                if rl.start_per_minute == 0 || rl.ask_per_minute == 0 || rl.register_per_minute == 0
                {
                    errors.push("gateway.rate_limit values must be greater than zero".into());
                }
            }
        }

        if let Some(logging) = &self.logging {
            if logging.format != "plain" && logging.format != "json" {
                errors.push(format!(
                    "logging.format must be \"plain\" or \"json\", got \"{}\"",
                    logging.format
                ));
            }
        }

        if self.allow_clear() {
            warnings.push("canvas.allow_clear is on: any participant can wipe the canvas".into());
        }

        (warnings, errors)
    }
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".drawboard")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_DB_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_DB_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_DB_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_DB_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway_port(), 8000);
        assert_eq!(config.bind_addr(), "0.0.0.0");
        assert_eq!(config.outbound_buffer(), 1024);
        assert!(!config.allow_clear());
        assert_eq!(config.stroke_interval_ms(), 300);
        assert_eq!(config.context_events(), 50);
        assert_eq!(config.rate_limits().start_per_minute, 10);
        assert_eq!(config.provider_cooldown_ms("gemini"), 60_000);
        assert_eq!(config.provider_cooldown_ms("claude"), 0);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert!(config.gateway.is_none());
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                gateway: { port: 9100, outbound_buffer: 16 },
                canvas: { allow_clear: true },
                agents: { stroke_interval_ms: 5, provider_cooldown_ms: { gemini: 60000 } },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.gateway_port(), 9100);
        assert_eq!(config.outbound_buffer(), 16);
        assert!(config.allow_clear());
        assert_eq!(config.stroke_interval_ms(), 5);
        assert_eq!(config.provider_cooldown_ms("gemini"), 60000);
        assert_eq!(config.provider_cooldown_ms("openai"), 0);
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ gateway: ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::DrawboardError::Config(_)));
    }

    #[test]
    fn test_provider_resolve_api_key() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_DB_API_KEY", "from-env") };
        let provider = ProviderConfig {
            id: "test".into(),
            api_key_env: Some("TEST_DB_API_KEY".into()),
            api_key: None,
            base_url: None,
            default_model: None,
        };
        assert_eq!(provider.resolve_api_key(), Some("from-env".into()));

        let provider2 = ProviderConfig {
            api_key: Some("direct-key".into()),
            ..provider
        };
        assert_eq!(provider2.resolve_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_DB_API_KEY") };
    }

    #[test]
    fn test_conventional_key_env() {
        assert_eq!(conventional_key_env("openai"), Some("OPENAI_API_KEY"));
        assert_eq!(conventional_key_env("claude"), Some("ANTHROPIC_API_KEY"));
        assert_eq!(conventional_key_env("gemini"), Some("GEMINI_API_KEY"));
        assert_eq!(conventional_key_env("unknown"), None);
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate_missing_api_key_warns() {
        let config = Config {
            models: Some(ModelsConfig {
                providers: Some(vec![ProviderConfig {
                    id: "perplexity-test".into(),
                    api_key: None,
                    api_key_env: None,
                    base_url: None,
                    default_model: None,
                }]),
            }),
            ..Config::default()
        };
        let (warnings, errors) = config.validate();
        assert!(errors.is_empty());
        assert!(
            warnings.iter().any(|w| w.contains("perplexity-test")),
            "Expected a warning about the missing key, got: {warnings:?}"
        );
    }

    #[test]
    fn test_validate_zero_buffer_errors() {
        let config = Config {
            gateway: Some(GatewayConfig {
                port: 8000,
                bind: None,
                outbound_buffer: 0,
                rate_limit: Some(RateLimitConfig {
                    start_per_minute: 0,
                    ..RateLimitConfig::default()
                }),
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert_eq!(errors.len(), 2, "got: {errors:?}");
    }

    #[test]
    fn test_validate_buffer_must_hold_handshake() {
        let with_buffer = |outbound_buffer| Config {
            gateway: Some(GatewayConfig {
                outbound_buffer,
                ..GatewayConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = with_buffer(1).validate();
        assert_eq!(errors, ["gateway.outbound_buffer must be at least 2"]);
        let (_warnings, errors) = with_buffer(2).validate();
        assert!(errors.is_empty(), "got: {errors:?}");
    }

    #[test]
    fn test_validate_bad_log_format() {
        let config: Config = json5::from_str(r#"{ logging: { format: "xml" } }"#).unwrap();
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("logging.format")));
    }
}
