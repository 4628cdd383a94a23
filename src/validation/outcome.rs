//! Raw results of a single validator invocation.
//!
//! The validator's exit code does not tell success from failure, so an
//! outcome only records what the process produced. Deciding what it means is
//! the classifier's job.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default compile target passed to `concerto compile`
pub const DEFAULT_TARGET: &str = "JSONSchema";

/// Which check the validator should perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ValidationMode {
    /// Syntax-only check (`concerto parse`)
    Parse,
    /// Full semantic and type check against a named target (`concerto compile`)
    Compile { target: String },
}

impl ValidationMode {
    /// Compile mode against the default target
    pub fn compile() -> Self {
        ValidationMode::Compile {
            target: DEFAULT_TARGET.to_string(),
        }
    }

    /// Subcommand name understood by the validator
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMode::Parse => "parse",
            ValidationMode::Compile { .. } => "compile",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Parse => write!(f, "parse"),
            ValidationMode::Compile { target } => write!(f, "compile ({})", target),
        }
    }
}

/// Result of one validator invocation that actually ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// The check that produced this outcome
    pub mode: ValidationMode,

    /// Combined stdout and stderr, in that order
    pub raw_output: String,

    /// Standard output from the validator
    pub stdout: String,

    /// Standard error from the validator
    pub stderr: String,

    /// Exit code; `None` when the process ended by signal. Auxiliary only.
    pub exit_code: Option<i32>,

    /// Compile wrote at least one file to its output directory
    #[serde(default)]
    pub artifact_produced: bool,
}

impl ValidationOutcome {
    /// Build an outcome from captured process output
    pub fn from_output(mode: ValidationMode, exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        let raw_output = match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
            (false, true) => stdout.trim_end().to_string(),
            (true, false) => stderr.trim_end().to_string(),
            (true, true) => String::new(),
        };

        Self {
            mode,
            raw_output,
            stdout,
            stderr,
            exit_code,
            artifact_produced: false,
        }
    }

    /// Record whether the invocation left files in its output directory
    pub fn with_artifact(mut self, produced: bool) -> Self {
        self.artifact_produced = produced;
        self
    }

    /// Build an outcome from text alone, as if written to stdout
    pub fn from_text(mode: ValidationMode, raw_output: impl Into<String>, exit_code: Option<i32>) -> Self {
        let raw_output = raw_output.into();
        Self {
            mode,
            stdout: raw_output.clone(),
            raw_output,
            stderr: String::new(),
            exit_code,
            artifact_produced: false,
        }
    }
}

/// Failures where the validator never produced classifiable output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    /// The tool is missing or the process could not start
    #[error("validator unavailable: {0}")]
    Environment(String),

    /// The tool exceeded its wall-clock bound and was killed
    #[error("validator timed out after {0:?}")]
    Timeout(Duration),
}
