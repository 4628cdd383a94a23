//! Validation against the external concerto tool
//!
//! The adapter runs the tool and captures what it printed, the classifier
//! turns that text into a verdict, and `check` chains parse and compile.

pub mod adapter;
pub mod check;
pub mod classifier;
pub mod outcome;

pub use adapter::{CliConfig, ConcertoCli, Validator};
pub use check::{CheckReport, Stage, check, check_file};
pub use classifier::{ClassifiedError, ErrorCategory, classify};
pub use outcome::{DEFAULT_TARGET, ValidationMode, ValidationOutcome, ValidatorError};
