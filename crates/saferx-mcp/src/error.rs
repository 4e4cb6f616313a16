//! Error types for the SafeRx adapter.

use serde_json::Value;
use thiserror::Error;

/// Main error type for the adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Configuration errors (missing API key, invalid base URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tool arguments rejected before any outbound request was made
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Registration errors (duplicate tool names)
    #[error("Registry error: {0}")]
    Registry(String),

    /// Runtime errors (tool task crashed, transport closed)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Network failures talking to the SafeRx backend
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// The backend answered with a body that is not JSON
    #[error("Malformed backend response (HTTP {status}): {message}")]
    MalformedResponse { status: u16, message: String },

    /// IO errors (stdio transport)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AdapterError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Schema validation failure for a tool call.
///
/// `violations` is surfaced to the host as the JSON-RPC error `data`.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub violations: Vec<Value>,
}

impl ValidationError {
    #[must_use]
    pub fn new(message: impl Into<String>, violations: Vec<Value>) -> Self {
        Self {
            message: message.into(),
            violations,
        }
    }

    /// JSON-RPC `data` payload for this error.
    #[must_use]
    pub fn data(&self) -> Value {
        serde_json::json!({
            "type": "validation-errors",
            "violations": self.violations,
        })
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
