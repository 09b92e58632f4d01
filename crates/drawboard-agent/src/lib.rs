//! Agent sessions for the shared canvas.
//!
//! Agents register to get an id, then start sessions against a drawing
//! capability. Each running session owns a cursor and a background loop that
//! turns capability answers into canvas events, which the manager appends to
//! the event log and fans out to every viewer.

pub mod manager;
pub mod runtime;
pub mod session;

pub use manager::AgentSessionManager;
pub use session::{LoopSettings, RegisteredAgent, SessionError, SessionInfo};
