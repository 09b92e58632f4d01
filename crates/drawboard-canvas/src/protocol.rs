//! Wire messages exchanged with viewers, one JSON object per frame.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event_log::CanvasEvent;

/// A cursor as shown to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorInfo {
    pub ai_name: String,
    pub x: f64,
    pub y: f64,
}

/// Error payload carried by a failed `res`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full history, sent first on attach.
    Sync { events: Vec<CanvasEvent> },
    /// Every running agent's cursor, sent right after `sync`.
    Cursors {
        cursors: BTreeMap<String, CursorInfo>,
    },
    Cursor {
        ai_id: String,
        ai_name: String,
        x: f64,
        y: f64,
    },
    CursorRemove { ai_ids: Vec<String> },
    Draw { event: CanvasEvent },
    /// Reset the local render state.
    Clear,
    AiError { ai_name: String, detail: String },
    Pong,
    /// Reply to a client `req`.
    Res {
        id: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorShape>,
    },
}

impl ServerMessage {
    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        ServerMessage::Res {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: ErrorShape) -> Self {
        ServerMessage::Res {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Live broadcast form of an appended event: `clear` for a Clear
    /// action, `draw` for everything else.
    pub fn for_event(event: CanvasEvent) -> Self {
        match event.action {
            crate::action::DrawingAction::Clear => ServerMessage::Clear,
            _ => ServerMessage::Draw { event },
        }
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> String {
        // only string map keys and finite floats reach this point
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to encode server message");
            String::from("{}")
        })
    }
}

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Req {
        id: String,
        method: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cursor_remove_shape() {
        let msg = ServerMessage::CursorRemove {
            ai_ids: vec!["abc".into()],
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(value, json!({"type": "cursor_remove", "ai_ids": ["abc"]}));
    }

    #[test]
    fn test_cursors_map_shape() {
        let mut cursors = BTreeMap::new();
        cursors.insert(
            "id1".to_string(),
            CursorInfo {
                ai_name: "Fox".into(),
                x: 1.0,
                y: 2.0,
            },
        );
        let value = serde_json::to_value(ServerMessage::Cursors { cursors }).unwrap();
        assert_eq!(value["type"], "cursors");
        assert_eq!(value["cursors"]["id1"]["ai_name"], "Fox");
    }

    #[test]
    fn test_clear_and_error_shapes() {
        assert_eq!(ServerMessage::Clear.to_json(), r#"{"type":"clear"}"#);
        let value = serde_json::to_value(ServerMessage::AiError {
            ai_name: "Fox".into(),
            detail: "rate limited".into(),
        })
        .unwrap();
        assert_eq!(value["type"], "ai_error");
    }

    #[test]
    fn test_res_omits_empty_fields() {
        let value = serde_json::to_value(ServerMessage::ok("1", json!({"n": 1}))).unwrap();
        assert_eq!(value, json!({"type": "res", "id": "1", "ok": true, "payload": {"n": 1}}));

        let value = serde_json::to_value(ServerMessage::err(
            "2",
            ErrorShape::new("unknown_agent", "no such agent"),
        ))
        .unwrap();
        assert_eq!(value["error"]["code"], "unknown_agent");
        assert!(value.get("payload").is_none());
    }

    #[test]
    fn test_client_messages() {
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);

        let req: ClientMessage =
            serde_json::from_str(r#"{"type":"req","id":"7","method":"agent.status"}"#).unwrap();
        match req {
            ClientMessage::Req { id, method, params } => {
                assert_eq!(id, "7");
                assert_eq!(method, "agent.status");
                assert!(params.is_null());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
