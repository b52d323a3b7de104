//! Error types for wlmerge.

use thiserror::Error;

/// Failure while decoding a single share link.
///
/// These never escape the public link/identity functions: callers get the
/// documented fallback (no endpoint, raw-prefix key, untouched link).
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Unsupported scheme")]
    UnsupportedScheme,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URI: {0}")]
    Uri(#[from] url::ParseError),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid port: {0}")]
    InvalidPort(String),
}

#[derive(Error, Debug)]
pub enum WlmergeError {
    #[error("No configs fetched from any source")]
    NoCandidates,

    #[error("Upload to {destination} failed: {message}")]
    Upload {
        destination: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}
