//! Configuration and shared error types for Drawboard.

pub mod config;
pub mod error;
