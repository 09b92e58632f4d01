//! Viewer-side render state, rebuilt from `sync` and kept current by the live stream.

use crate::action::DrawingAction;
use crate::event_log::CanvasEvent;
use crate::protocol::ServerMessage;

/// What a viewer currently shows: the actions drawn since the last clear,
/// in append order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    visible: Vec<DrawingAction>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the state a late joiner derives from a snapshot.
    pub fn replay(events: &[CanvasEvent]) -> Self {
        let mut state = Self::new();
        for event in events {
            state.apply_event(event);
        }
        state
    }

    pub fn apply_event(&mut self, event: &CanvasEvent) {
        match &event.action {
            DrawingAction::Clear => self.visible.clear(),
            action => self.visible.push(action.clone()),
        }
    }

    /// Apply one wire message. Messages that do not touch the drawing are ignored.
    pub fn apply_message(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::Sync { events } => *self = Self::replay(events),
            ServerMessage::Draw { event } => self.apply_event(event),
            ServerMessage::Clear => self.visible.clear(),
            _ => {}
        }
    }

    pub fn visible(&self) -> &[DrawingAction] {
        &self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventLog;

    fn dot(x: f64) -> DrawingAction {
        DrawingAction::Circle {
            x,
            y: 10.0,
            r: 3.0,
            color: "#000".into(),
            width: 1.0,
            fill: true,
        }
    }

    #[test]
    fn test_snapshot_replay_matches_live_stream() {
        let log = EventLog::new(true);
        let mut early = RenderState::new();
        let mut late: Option<RenderState> = None;

        let actions = vec![dot(1.0), dot(2.0), DrawingAction::Clear, dot(3.0), dot(4.0)];
        for (i, action) in actions.into_iter().enumerate() {
            let event = log.append(action, "a", "A").unwrap();
            early.apply_message(&ServerMessage::for_event(event.clone()));
            if let Some(state) = late.as_mut() {
                state.apply_message(&ServerMessage::for_event(event.clone()));
            }
            if i == 1 {
                let mut joined = RenderState::new();
                joined.apply_message(&ServerMessage::Sync {
                    events: log.snapshot(),
                });
                late = Some(joined);
            }
        }

        let fresh = RenderState::replay(&log.snapshot());
        assert_eq!(fresh, early);
        assert_eq!(late.unwrap(), early);
        assert_eq!(early.visible(), &[dot(3.0), dot(4.0)]);
    }

    #[test]
    fn test_sync_replaces_state() {
        let mut state = RenderState::new();
        state.apply_message(&ServerMessage::Clear);
        let log = EventLog::default();
        log.append(dot(5.0), "a", "A").unwrap();
        state.apply_message(&ServerMessage::Sync {
            events: log.snapshot(),
        });
        state.apply_message(&ServerMessage::Sync {
            events: log.snapshot(),
        });
        assert_eq!(state.visible().len(), 1);
    }

    #[test]
    fn test_cursor_messages_ignored() {
        let mut state = RenderState::new();
        state.apply_message(&ServerMessage::Cursor {
            ai_id: "a".into(),
            ai_name: "A".into(),
            x: 1.0,
            y: 1.0,
        });
        assert!(state.visible().is_empty());
    }
}
