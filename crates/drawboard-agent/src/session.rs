//! Agent and session records.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use drawboard_canvas::{CANVAS_HEIGHT, CANVAS_WIDTH, Point};
use drawboard_core::config::Config;
use drawboard_providers::registry::PROVIDER_IDS;

/// Distance kept from the canvas edge when placing a new cursor.
const CURSOR_MARGIN: f64 = 50.0;

/// A registered agent. The id is its credential for starting sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredAgent {
    pub agent_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent {0} is already running")]
    AlreadyRunning(String),
}

/// Public view of a running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub ai_id: String,
    pub ai_name: String,
    pub provider: String,
    pub x: f64,
    pub y: f64,
    pub started_at: DateTime<Utc>,
}

/// A running session, owned by the manager's session map.
pub(crate) struct ActiveSession {
    pub display_name: String,
    pub provider_id: String,
    pub cursor: Point,
    pub cancel: CancellationToken,
    /// Single-slot mailbox; a newer message replaces an unread one.
    pub pending: Option<String>,
    /// Distinguishes this run from earlier runs of the same agent.
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub task: Option<JoinHandle<()>>,
}

impl ActiveSession {
    pub fn info(&self, agent_id: &str) -> SessionInfo {
        SessionInfo {
            ai_id: agent_id.to_string(),
            ai_name: self.display_name.clone(),
            provider: self.provider_id.clone(),
            x: self.cursor.x,
            y: self.cursor.y,
            started_at: self.started_at,
        }
    }
}

/// Pacing of the drawing loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub stroke_interval: Duration,
    pub point_delay: Duration,
    pub segment_paths: bool,
    pub erase_cooldown: Duration,
    pub context_events: usize,
    pub provider_cooldowns: HashMap<String, Duration>,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        let mut ids: Vec<String> = PROVIDER_IDS.iter().map(|id| id.to_string()).collect();
        if let Some(agents) = &config.agents {
            ids.extend(agents.provider_cooldown_ms.keys().cloned());
        }
        let provider_cooldowns = ids
            .into_iter()
            .map(|id| {
                let ms = config.provider_cooldown_ms(&id);
                (id, Duration::from_millis(ms))
            })
            .filter(|(_, d)| !d.is_zero())
            .collect();

        Self {
            stroke_interval: Duration::from_millis(config.stroke_interval_ms()),
            point_delay: Duration::from_millis(config.point_delay_ms()),
            segment_paths: config.segment_paths(),
            erase_cooldown: Duration::from_millis(config.erase_cooldown_ms()),
            context_events: config.context_events(),
            provider_cooldowns,
        }
    }

    pub fn provider_cooldown(&self, provider_id: &str) -> Duration {
        self.provider_cooldowns
            .get(provider_id)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Fresh unguessable agent id: 12 random bytes, URL-safe base64.
pub(crate) fn new_agent_id() -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(rand::random::<[u8; 12]>())
}

/// Uniformly random cursor position away from the edges.
pub(crate) fn random_cursor() -> Point {
    Point::new(
        rand::random_range(CURSOR_MARGIN..=CANVAS_WIDTH - CURSOR_MARGIN),
        rand::random_range(CURSOR_MARGIN..=CANVAS_HEIGHT - CURSOR_MARGIN),
    )
}
