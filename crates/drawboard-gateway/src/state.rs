//! Gateway shared state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use drawboard_agent::{AgentSessionManager, LoopSettings};
use drawboard_canvas::{ConnectionRegistry, EventLog};
use drawboard_core::config::Config;
use drawboard_providers::ProviderRegistry;

use crate::rate_limit::RateLimiter;

/// Shared gateway state accessible from all connections and handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub log: Arc<EventLog>,
    pub viewers: Arc<ConnectionRegistry>,
    pub agents: Arc<AgentSessionManager>,
    pub providers: ProviderRegistry,
    pub limits: RateLimits,
    pub started_at: Instant,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

/// Per-IP limits for the expensive methods.
pub struct RateLimits {
    pub start: RateLimiter,
    pub register: RateLimiter,
    pub ask: RateLimiter,
}

impl RateLimits {
    fn from_config(config: &Config) -> Self {
        let limits = config.rate_limits();
        let window = Duration::from_secs(60);
        Self {
            start: RateLimiter::new("agent.start", limits.start_per_minute, window),
            register: RateLimiter::new("agent.register", limits.register_per_minute, window),
            ask: RateLimiter::new("canvas.ask", limits.ask_per_minute, window),
        }
    }

    /// Drop expired entries from every window.
    pub fn sweep(&self) {
        self.start.sweep();
        self.register.sweep();
        self.ask.sweep();
    }
}

impl GatewayState {
    pub fn new(config: Arc<Config>) -> Self {
        let log = Arc::new(EventLog::new(config.allow_clear()));
        let viewers = Arc::new(ConnectionRegistry::new());
        let agents = Arc::new(AgentSessionManager::new(
            log.clone(),
            viewers.clone(),
            LoopSettings::from_config(&config),
        ));

        Self {
            providers: ProviderRegistry::from_config(&config),
            limits: RateLimits::from_config(&config),
            config,
            log,
            viewers,
            agents,
            started_at: Instant::now(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Install the Prometheus recorder and serve it at `/metrics`.
    #[cfg(feature = "metrics")]
    pub fn with_prometheus(mut self) -> Self {
        match crate::metrics::install_prometheus_recorder() {
            Ok(handle) => self.metrics = Some(handle),
            Err(e) => tracing::warn!(%e, "Prometheus recorder not installed"),
        }
        self
    }
}
