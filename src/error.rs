//! Error types for fmturl

use thiserror::Error;

/// Failure reported by a decipher engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Engine has not finished loading yet
    #[error("Decipher engine not ready: {0}")]
    NotReady(String),

    /// Engine rejected the input; asking again will not help
    #[error("Decipher engine rejected input: {0}")]
    InvalidInput(String),

    /// Engine failed for reasons unrelated to the input
    #[error("Decipher engine failure: {0}")]
    Internal(String),

    /// Engine could not be loaded and never will be
    #[error("Decipher engine unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// Check if the same call may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::NotReady(_) | EngineError::Internal(_))
    }
}

/// Main error type for stream URL resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Variant has neither url nor signatureCipher")]
    Unresolvable,

    #[error("Signature cipher is missing \"{0}\"")]
    MalformedCipher(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Resolution cancelled")]
    Cancelled,

    #[error("Gave up after {0} attempts")]
    AttemptsExhausted(u32),
}

impl ResolveError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::Engine(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Check if the variant itself can never produce a URL
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ResolveError::Unresolvable
                | ResolveError::MalformedCipher(_)
                | ResolveError::InvalidUrl(_)
                | ResolveError::Engine(EngineError::InvalidInput(_))
                | ResolveError::Engine(EngineError::Unavailable(_))
        )
    }
}

impl From<url::ParseError> for ResolveError {
    fn from(e: url::ParseError) -> Self {
        ResolveError::InvalidUrl(e.to_string())
    }
}

/// Errors raised while loading a script-backed engine
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch script: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Script does not define function {0}")]
    MissingFunction(&'static str),
}
