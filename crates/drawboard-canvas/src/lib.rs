//! Shared canvas model.
//!
//! Drawing actions are validated, appended to a single in-memory event log
//! and fanned out to every connected viewer. Late joiners receive the full
//! log as a `sync` message and replay it into the same render state the
//! live stream produces.

pub mod action;
pub mod context;
pub mod event_log;
pub mod protocol;
pub mod registry;
pub mod render;

pub use action::{CANVAS_HEIGHT, CANVAS_WIDTH, DrawingAction, Point, ValidationError, validate};
pub use event_log::{CanvasEvent, EventLog};
pub use protocol::{ClientMessage, CursorInfo, ErrorShape, ServerMessage};
pub use registry::{ConnectionError, ConnectionId, ConnectionRegistry};
pub use render::RenderState;
