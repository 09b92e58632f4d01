//! Prometheus metrics recording and endpoint.

use std::collections::BTreeMap;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::GatewayState;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Record a method request with its duration and outcome.
pub fn record_request(method: &str, duration_secs: f64, ok: bool) {
    let labels = [
        ("method", method.to_string()),
        ("ok", ok.to_string()),
    ];
    metrics::counter!("drawboard_requests_total", &labels).increment(1);
    metrics::histogram!("drawboard_request_duration_seconds", &labels).record(duration_secs);
}

/// Record a viewer connecting.
pub fn record_viewer_connect() {
    metrics::counter!("drawboard_viewer_connections_total").increment(1);
}

/// Refresh the gauges derived from live state. Called on every scrape.
pub fn record_snapshot(state: &GatewayState) {
    metrics::gauge!("drawboard_viewers_active").set(state.viewers.len() as f64);
    metrics::gauge!("drawboard_viewers_pruned").set(state.viewers.pruned_total() as f64);
    metrics::gauge!("drawboard_agents_running").set(state.agents.running_count() as f64);
    metrics::gauge!("drawboard_agent_failures").set(state.agents.failures_total() as f64);

    for (kind, count) in events_by_kind(state) {
        let labels = [("kind", kind.to_string())];
        metrics::gauge!("drawboard_events", &labels).set(count as f64);
    }
}

fn events_by_kind(state: &GatewayState) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for event in state.log.snapshot() {
        *counts.entry(event.action.kind()).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use drawboard_canvas::DrawingAction;
    use drawboard_core::config::Config;

    #[test]
    fn test_install_prometheus_recorder() {
        // only one recorder per process, so this is the only test that installs
        let handle = install_prometheus_recorder().unwrap();
        record_request("canvas.draw", 0.01, true);
        assert!(handle.render().contains("drawboard_requests_total"));
    }

    #[test]
    fn test_events_by_kind() {
        let state = GatewayState::new(Arc::new(Config::default()));
        let dot = DrawingAction::Circle {
            x: 5.0,
            y: 5.0,
            r: 1.0,
            color: "#000".into(),
            width: 1.0,
            fill: true,
        };
        state.log.append(dot.clone(), "a", "A").unwrap();
        state.log.append(dot, "a", "A").unwrap();
        let counts = events_by_kind(&state);
        assert_eq!(counts.get("circle"), Some(&2));
        record_snapshot(&state);
    }

    #[test]
    fn test_record_without_recorder_does_not_panic() {
        record_viewer_connect();
        record_request("agent.status", 0.1, false);
    }
}
