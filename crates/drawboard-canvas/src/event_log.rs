//! Append-only, process-lifetime log of canvas events.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{DrawingAction, ValidationError};

/// One immutable entry of the shared canvas history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasEvent {
    pub action: DrawingAction,
    pub agent_id: String,
    #[serde(rename = "ai_name")]
    pub agent_name: String,
    pub sequence_index: u64,
    pub timestamp: DateTime<Utc>,
}

/// Authoritative canvas content. Sequence indexes are assigned under the
/// lock, so they are gapless and follow append order.
pub struct EventLog {
    events: Mutex<Vec<CanvasEvent>>,
    allow_clear: bool,
}

impl EventLog {
    pub fn new(allow_clear: bool) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            allow_clear,
        }
    }

    pub fn allow_clear(&self) -> bool {
        self.allow_clear
    }

    /// Validate `action` and append it. Rejected actions leave the log untouched.
    pub fn append(
        &self,
        action: DrawingAction,
        agent_id: &str,
        agent_name: &str,
    ) -> Result<CanvasEvent, ValidationError> {
        if matches!(action, DrawingAction::Clear) && !self.allow_clear {
            return Err(ValidationError::ClearDisabled);
        }
        action.validate()?;

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let event = CanvasEvent {
            action,
            agent_id: agent_id.to_string(),
            agent_name: agent_name.to_string(),
            sequence_index: events.len() as u64,
            timestamp: Utc::now(),
        };
        events.push(event.clone());
        tracing::trace!(seq = event.sequence_index, kind = event.action.kind(), agent = %agent_name, "event appended");
        Ok(event)
    }

    /// Full ordered history at this instant.
    pub fn snapshot(&self) -> Vec<CanvasEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<CanvasEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(false)
    }
}
