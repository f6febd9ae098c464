//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Vendor rejected the request (non-success HTTP status)
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Vendor could not be reached (connect, timeout, broken transport)
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Vendor reply could not be interpreted
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Vendor sent tool arguments that are not a JSON object
    #[error("Malformed arguments for tool '{tool}': {reason}")]
    MalformedToolArguments { tool: String, reason: String },

    /// Message failed structural validation
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// A transcript was handed to the adapter of another vendor
    #[error("History mismatch: expected {expected} transcript, got {actual}")]
    HistoryMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProviderUnavailable(_) | Self::RateLimited(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Convert to a user-friendly message. Vendor and transport detail never leaks.
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited(_) => "Too many requests. Please wait a moment.".into(),
            Self::InvalidMessage(msg) => format!("Invalid message: {msg}"),
            _ => "Processing failed. Please try again.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
