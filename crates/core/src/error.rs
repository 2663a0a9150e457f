//! Error types for the quill domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; the top-level `Error`
//! aggregates them for callers that cross contexts.

use thiserror::Error;

/// The top-level error type for quill operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Summarization error: {0}")]
    Summarize(#[from] SummarizeError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors from the model transport collaborator.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl TransportError {
    /// Whether a retry with backoff can plausibly succeed.
    ///
    /// Auth failures and 4xx API errors are permanent; everything else
    /// (network faults, rate limits, interrupted streams, 5xx) is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited { .. } | Self::StreamInterrupted(_) => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            Self::Auth(_) => false,
        }
    }
}

/// Errors from tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

/// Errors from tool registration. Fatal at startup, before any turn begins.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Tool name must be non-empty")]
    EmptyName,
}

/// Errors from the summarizer collaborator. Never fatal to a turn.
#[derive(Debug, Clone, Error)]
pub enum SummarizeError {
    #[error("Summarization failed: {0}")]
    Failed(String),
}
