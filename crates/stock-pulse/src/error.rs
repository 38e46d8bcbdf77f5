//! Error types for the research pipeline

use pulse_llm::LLMError;
use pulse_utils::EnvError;
use std::time::Duration;
use thiserror::Error;

use crate::state::FailureKind;

/// Run-level errors
///
/// Only [`PulseError::InvalidInput`] and [`PulseError::ModelUnavailable`]
/// can escape a workflow run. The remaining variants are raised while the
/// pipeline is being assembled.
#[derive(Debug, Error)]
pub enum PulseError {
    /// The company name was empty or blank
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The language model could not produce a completion
    #[error("Language model unavailable: {0}")]
    ModelUnavailable(#[from] LLMError),

    /// Configuration rejected during validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed environment variable
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PulseError>;

/// Failure of a single data-source lookup
///
/// These never abort a run: the collector turns them into
/// [`crate::state::SourceErrorTag`]s.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source answered but has nothing for this company
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider needs a credential that is not configured
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Lookup did not finish within the request timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Provider throttled the request
    #[error("Rate limited by {0}")]
    RateLimited(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl SourceError {
    /// Failure kind recorded in the state
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::MissingCredential(_) => FailureKind::MissingCredential,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::Network(e) if e.is_timeout() => FailureKind::Timeout,
            Self::Network(_) => FailureKind::Network,
            Self::UnexpectedResponse(_) => FailureKind::UnexpectedResponse,
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::UnexpectedResponse(err.to_string())
    }
}
