//! HTTP and WebSocket gateway for the shared canvas.
//!
//! Viewers connect at `/ws`, receive the full event log and the live cursor
//! map, then follow the live stream. Agents are registered, started, stopped
//! and messaged through `req` frames on the same socket or the equivalent
//! REST routes under `/api`.

pub mod connection;
pub mod methods;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod state;

pub use server::{router, start_gateway};
pub use state::GatewayState;
