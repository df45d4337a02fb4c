//! Error types for askba

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::ModelFailure;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Whether an error aborts the process or only the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Raised while setting up the engine; no answering is possible.
    Setup,
    /// Raised while answering one question; the caller shows it to the user.
    Request,
}

/// Core error types for the answering engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Corpus not found: {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("Corpus contains no usable documents: {}", .0.display())]
    CorpusEmpty(PathBuf),

    #[error("Unsupported language: {0:?} (supported: de, en, tr)")]
    UnsupportedLanguage(String),

    #[error("No generation model available after {} attempt(s): {}", .failures.len(), describe_failures(.failures))]
    GenerationUnavailable { failures: Vec<ModelFailure> },

    #[error("Generation timed out after {:.1}s: {}", .elapsed.as_secs_f32(), describe_failures(.failures))]
    GenerationTimeout {
        elapsed: Duration,
        failures: Vec<ModelFailure>,
    },

    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify the error as fatal setup failure or recoverable request failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::CorpusNotFound(_)
            | Error::CorpusEmpty(_)
            | Error::Configuration(_)
            | Error::Authentication(_)
            | Error::Io(_) => ErrorClass::Setup,
            _ => ErrorClass::Request,
        }
    }

    /// Failures of the individual model candidates, if this error carries any.
    pub fn model_failures(&self) -> &[ModelFailure] {
        match self {
            Error::GenerationUnavailable { failures } => failures,
            Error::GenerationTimeout { failures, .. } => failures,
            _ => &[],
        }
    }
}

fn describe_failures(failures: &[ModelFailure]) -> String {
    if failures.is_empty() {
        return "no candidates attempted".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
