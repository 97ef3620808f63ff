//! Error types for Parley
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Parley operations
///
/// Request-level failures are split into client errors (`EmptyInput`) and
/// failures of the external completion endpoint (`Upstream`). The HTTP layer
/// maps each variant onto a status code.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// The user message was blank after trimming
    #[error("Empty message")]
    EmptyInput,

    /// The request body could not be understood
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any failure reported by the completion or model-listing endpoint
    /// (network, authentication, malformed payload). Carries the upstream text.
    #[error("{0}")]
    Upstream(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local store errors (settings and prompt library persistence)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Session store errors
    #[error("Session error: {0}")]
    Session(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid endpoint URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for Parley operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
