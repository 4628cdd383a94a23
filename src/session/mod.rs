//! Validation-retry control loop
//!
//! `state` holds the explicit state machine, `runner` drives it against a
//! generator and a validator.

pub mod runner;
pub mod state;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ClassifiedError;

pub use runner::{RepairConfig, RepairLoop};
pub use state::{Attempt, DEFAULT_MAX_ATTEMPTS, Phase, RetrySession, SessionStatus, Step};

/// Why a session gave up: every attempt produced a content error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhaustedReport {
    pub session_id: Uuid,
    pub last_error: ClassifiedError,
    pub history: Vec<Attempt>,
}

impl ExhaustedReport {
    pub fn attempts(&self) -> usize {
        self.history.len()
    }

    /// One line per attempt: number, category, message
    pub fn trail(&self) -> Vec<String> {
        self.history
            .iter()
            .map(|a| format!("attempt {}: [{}] {}", a.number, a.classified.category, a.classified.message))
            .collect()
    }
}
