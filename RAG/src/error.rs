//! Error types for the RAG pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by the hosted generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("request throttled: {0}")]
    Throttling(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

impl ProviderError {
    /// Whether repeating the same call later may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ProviderError::Throttling(_) | ProviderError::Timeout(_) | ProviderError::Transport(_)
        )
    }

    /// Short machine-readable name, used in logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Authentication(_) => "authentication_error",
            ProviderError::Throttling(_) => "throttling_error",
            ProviderError::ModelNotFound(_) => "model_not_found",
            ProviderError::MalformedResponse(_) => "malformed_response",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Transport(_) => "transport_error",
            ProviderError::Http { .. } => "provider_error",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Errors that can occur while configuring or running the pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or invalid setting. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Index, chunk store or metadata store missing or corrupt. Fatal at startup.
    #[error("failed to load index from {}: {message}", .path.display())]
    IndexLoad { path: PathBuf, message: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Bad user input; the caller should re-prompt.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl RagError {
    pub fn index_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        RagError::IndexLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Startup errors terminate the process; everything else is per-request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RagError::Configuration(_) | RagError::IndexLoad { .. })
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            RagError::Provider(err) => err.is_retriable(),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "configuration_error",
            RagError::IndexLoad { .. } => "index_load_error",
            RagError::DimensionMismatch { .. } => "dimension_mismatch",
            RagError::Embedding(_) => "embedding_error",
            RagError::Provider(err) => err.kind(),
            RagError::Validation(_) => "validation_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_is_retriable_but_auth_is_not() {
        let throttled = RagError::from(ProviderError::Throttling("slow down".into()));
        let denied = RagError::from(ProviderError::Authentication("bad token".into()));

        assert!(throttled.is_retriable());
        assert!(!denied.is_retriable());
        assert_eq!(throttled.kind(), "throttling_error");
    }

    #[test]
    fn startup_errors_are_fatal() {
        assert!(RagError::Configuration("BEDROCK_MODEL_ID is not set".into()).is_fatal());
        assert!(RagError::index_load("data/index.json", "not found").is_fatal());
        assert!(!RagError::Validation("empty".into()).is_fatal());
        assert!(!RagError::DimensionMismatch { expected: 4, actual: 3 }.is_fatal());
    }

    #[test]
    fn index_load_message_names_the_path() {
        let err = RagError::index_load("data/processed/index.json", "file not found");
        assert_eq!(
            err.to_string(),
            "failed to load index from data/processed/index.json: file not found"
        );
    }
}
