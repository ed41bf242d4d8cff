//! Monitoring session coordination
//!
//! The composition root: one session per application instance, coordinating
//! the engine supervisor and the feed connector behind an idempotent
//! start/stop surface.

pub mod controller;

pub use controller::{SessionController, SessionState};
