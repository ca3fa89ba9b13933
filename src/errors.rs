//! Error types for ollamacode
//!
//! Only failures that stop an operation live here. Malformed tags, syntax
//! failures and per-target write failures are reported as values by the
//! components that produce them.

use thiserror::Error;

/// Main error type for the assistant core
#[derive(Error, Debug)]
pub enum AgentError {
    /// Correction state machine transition errors
    #[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Language model backend unreachable or returned nothing usable
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Web search backend unreachable or disabled
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// Streaming errors
    #[error("Streaming error: {0}")]
    StreamingError(String),

    /// JSON parsing errors
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    /// Ollama API errors
    #[error("Ollama API error: {0}")]
    OllamaApiError(String),

    /// A directive target could not be narrowed to a single file
    #[error("Ambiguous target: {reason}")]
    AmbiguityUnresolved { reason: String },

    /// Target path refused by the project path policy
    #[error("Path rejected: {path} ({reason})")]
    PathRejected { path: String, reason: String },

    /// Write or directory creation failed for one target
    #[error("Mutation failed for {target}: {reason}")]
    Mutation { target: String, reason: String },

    /// SEARCH/REPLACE patch could not be applied
    #[error("Patch failed: {0}")]
    PatchError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic errors with context
    #[error("Agent error: {0}")]
    Generic(String),
}

impl AgentError {
    /// Whether this error means an external collaborator could not be reached
    pub fn is_collaborator_unavailable(&self) -> bool {
        matches!(
            self,
            AgentError::ModelUnavailable(_)
                | AgentError::SearchUnavailable(_)
                | AgentError::OllamaApiError(_)
                | AgentError::StreamingError(_)
                | AgentError::HttpError(_)
        )
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Convert anyhow errors to AgentError
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Generic(err.to_string())
    }
}
