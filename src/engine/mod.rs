//! Engine process supervision
//!
//! Owns the lifecycle of the external monitoring engine process.

pub mod supervisor;

pub use supervisor::EngineSupervisor;
