//! Retry session state machine.
//!
//! All phase changes go through [`RetrySession::advance`]. The driver in
//! `runner` performs the I/O and feeds the results in as [`Step`]s.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AccordoError, Result};
use crate::validation::{ClassifiedError, ValidationOutcome, classify};

use super::ExhaustedReport;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// One generated candidate and its verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number
    pub number: u32,
    pub candidate: String,
    pub classified: ClassifiedError,
    pub at: DateTime<Utc>,
}

/// Where the session is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Init,
    Generating,
    Validating {
        candidate: String,
    },
    Classifying {
        candidate: String,
        outcome: ValidationOutcome,
    },
    Repairing {
        candidate: String,
        classified: ClassifiedError,
    },
    Succeeded {
        candidate: String,
    },
    FailedExhausted,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Generating => "generating",
            Phase::Validating { .. } => "validating",
            Phase::Classifying { .. } => "classifying",
            Phase::Repairing { .. } => "repairing",
            Phase::Succeeded { .. } => "succeeded",
            Phase::FailedExhausted => "failed_exhausted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded { .. } | Phase::FailedExhausted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Input to a transition
#[derive(Debug, Clone)]
pub enum Step {
    Begin,
    Generated(String),
    Validated(ValidationOutcome),
    Classify,
    Retry,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Begin => "begin",
            Step::Generated(_) => "generated",
            Step::Validated(_) => "validated",
            Step::Classify => "classify",
            Step::Retry => "retry",
        }
    }
}

/// Coarse status derived from the phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Succeeded,
    FailedExhausted,
}

/// State for one generation request
#[derive(Debug)]
pub struct RetrySession {
    id: Uuid,
    attempt: u32,
    max_attempts: u32,
    history: Vec<Attempt>,
    phase: Phase,
}

impl RetrySession {
    /// Create a session; `max_attempts` is raised to at least 1
    pub fn new(max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempt: 0,
            max_attempts: max_attempts.max(1),
            history: Vec::new(),
            phase: Phase::Init,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn history(&self) -> &[Attempt] {
        &self.history
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn status(&self) -> SessionStatus {
        match self.phase {
            Phase::Succeeded { .. } => SessionStatus::Succeeded,
            Phase::FailedExhausted => SessionStatus::FailedExhausted,
            _ => SessionStatus::InProgress,
        }
    }

    /// The accepted candidate, once succeeded
    pub fn accepted(&self) -> Option<&str> {
        match &self.phase {
            Phase::Succeeded { candidate } => Some(candidate),
            _ => None,
        }
    }

    /// Apply one step. An illegal step leaves the session untouched.
    pub fn advance(&mut self, step: Step) -> Result<&Phase> {
        let current = std::mem::replace(&mut self.phase, Phase::Init);

        let next = match (current, step) {
            (Phase::Init, Step::Begin) => {
                self.attempt = 1;
                Phase::Generating
            }
            (Phase::Generating, Step::Generated(candidate)) => Phase::Validating { candidate },
            (Phase::Validating { candidate }, Step::Validated(outcome)) => Phase::Classifying { candidate, outcome },
            (Phase::Classifying { candidate, outcome }, Step::Classify) => {
                let classified = classify(&outcome);
                if classified.is_success() {
                    Phase::Succeeded { candidate }
                } else if self.attempt < self.max_attempts {
                    Phase::Repairing { candidate, classified }
                } else {
                    self.record(candidate, classified);
                    Phase::FailedExhausted
                }
            }
            (Phase::Repairing { candidate, classified }, Step::Retry) => {
                self.record(candidate, classified);
                self.attempt += 1;
                Phase::Generating
            }
            (current, step) => {
                let msg = format!("cannot apply '{}' while {}", step.name(), current.name());
                self.phase = current;
                return Err(AccordoError::InvalidState(msg));
            }
        };

        self.phase = next;
        Ok(&self.phase)
    }

    /// Consume an exhausted session into its failure report
    pub fn into_report(self) -> Result<ExhaustedReport> {
        if self.phase != Phase::FailedExhausted {
            return Err(AccordoError::InvalidState(format!(
                "session {} is {}, not exhausted",
                self.id, self.phase
            )));
        }

        let last_error = self
            .history
            .last()
            .map(|a| a.classified.clone())
            .ok_or_else(|| AccordoError::InvalidState("exhausted session has no attempts".to_string()))?;

        Ok(ExhaustedReport {
            session_id: self.id,
            last_error,
            history: self.history,
        })
    }

    fn record(&mut self, candidate: String, classified: ClassifiedError) {
        self.history.push(Attempt {
            number: self.attempt,
            candidate,
            classified,
            at: Utc::now(),
        });
    }
}
