//! Error types for hmo-chat.

use std::time::Duration;

use crate::profile::ProfileField;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Knowledge-base retrieval errors.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The index was never built or holds no documents. Distinct from a
    /// search that simply matches nothing.
    #[error("Knowledge index is unavailable: {reason}")]
    IndexUnavailable { reason: String },

    #[error("Embedding generation failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("Embedding call timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Knowledge document loading failed: {reason}")]
    LoadFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Conversation-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The completion text did not parse into the expected JSON schema.
    /// Always recovered inside the collection stage; never shown raw to
    /// the end user.
    #[error("Malformed completion response: {reason}")]
    MalformedResponse { reason: String },

    /// A collected value failed its format/range rule. Not a hard error:
    /// the field is routed back into missing_fields.
    #[error("Validation failed for field {0}")]
    ValidationFailed(ProfileField),

    /// An upstream completion or embedding call exceeded its deadline.
    #[error("Upstream call timed out")]
    UpstreamTimeout,

    /// An upstream service failed outright.
    #[error("Upstream service unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("Unknown session: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Retrieval error: {0}")]
    Retrieval(RetrievalError),
}

impl From<LlmError> for ChatError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout { .. } => ChatError::UpstreamTimeout,
            other => ChatError::UpstreamUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

impl From<RetrievalError> for ChatError {
    fn from(e: RetrievalError) -> Self {
        match e {
            // A retrieval deadline is an upstream timeout like any other:
            // the turn gets a retry reply, not a hard failure.
            RetrievalError::Timeout { .. } => ChatError::UpstreamTimeout,
            other => ChatError::Retrieval(other),
        }
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
