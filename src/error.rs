//! Error types for Accordo
//!
//! Centralized error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;
use crate::session::ExhaustedReport;
use crate::validation::ValidatorError;

/// All error types that can occur in Accordo
#[derive(Debug, Error)]
pub enum AccordoError {
    /// The validator could not be located or started
    #[error("Environment error: {0}")]
    Environment(String),

    /// The validator exceeded its wall-clock bound
    #[error("Validator timed out after {after:?}")]
    Timeout { after: Duration },

    /// Every attempt produced a content error
    #[error("Validation failed after {} attempts: {}", .0.attempts(), .0.last_error.message)]
    Exhausted(Box<ExhaustedReport>),

    /// The candidate generator could not produce model text
    #[error("Generation error: {0}")]
    Generation(String),

    /// LLM API error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Requirements analysis produced no usable intent
    #[error("Requirements analysis failed: {0}")]
    Analysis(String),

    /// Structured intent breaks a naming or shape rule
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Prompt template failed to register or render
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AccordoError {
    /// Whether the failure came from infrastructure rather than model content
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AccordoError::Environment(_) | AccordoError::Timeout { .. })
    }
}

impl From<ValidatorError> for AccordoError {
    fn from(err: ValidatorError) -> Self {
        match err {
            ValidatorError::Environment(msg) => AccordoError::Environment(msg),
            ValidatorError::Timeout(after) => AccordoError::Timeout { after },
        }
    }
}

/// Result type alias for Accordo operations
pub type Result<T> = std::result::Result<T, AccordoError>;
