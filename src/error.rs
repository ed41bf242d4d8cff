//! `NetSentry` Error Types
//!
//! Centralized error handling using thiserror for type-safe errors.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for `NetSentry`
#[derive(Error, Debug)]
pub enum NetSentryError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine process supervision errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to spawn engine '{binary}': {reason}")]
    SpawnFailed { binary: PathBuf, reason: String },

    #[error("Failed to signal engine process: {reason}")]
    SignalFailed { reason: String },
}

/// Feed connection errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("WebSocket handshake with '{url}' failed: {reason}")]
    HandshakeFailed { url: String, reason: String },

    #[error("Feed connection closed: {reason}")]
    ConnectionClosed { reason: String },
}

/// Authentication errors from the external identity service
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The identity service rejected the request; the message is
    /// human-readable and safe to display as-is.
    #[error("{message}")]
    Rejected { message: String },

    #[error("Malformed identity service response: {0}")]
    MalformedResponse(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(String),

    #[error("Failed to read/write configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for `NetSentry` operations
pub type Result<T> = std::result::Result<T, NetSentryError>;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for feed operations
pub type FeedResult<T> = std::result::Result<T, FeedError>;

/// Result type alias for auth operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result type alias for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
