//! Two-stage check: parse first, compile only when parsing is clean.

use std::fmt;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use super::adapter::{ConcertoCli, Validator};
use super::classifier::{ClassifiedError, classify};
use super::outcome::{ValidationMode, ValidationOutcome, ValidatorError};

/// Which stage produced the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Compile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Parse => write!(f, "parse"),
            Stage::Compile => write!(f, "compile"),
        }
    }
}

/// Verdict of a two-stage check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub stage: Stage,
    pub outcome: ValidationOutcome,
    pub classified: ClassifiedError,
}

impl CheckReport {
    pub fn is_success(&self) -> bool {
        self.classified.is_success()
    }
}

/// Parse `source`, and compile it against `target` only if the parse is clean.
pub async fn check(validator: &dyn Validator, source: &str, target: &str) -> Result<CheckReport, ValidatorError> {
    let parsed = validator.validate(source, &ValidationMode::Parse).await?;
    if let Some(report) = parse_verdict(parsed) {
        return Ok(report);
    }

    let compiled = validator.validate(source, &compile_mode(target)).await?;
    Ok(compile_verdict(compiled))
}

/// Two-stage check of a model file in place
pub async fn check_file(cli: &ConcertoCli, path: &Path, target: &str) -> Result<CheckReport, ValidatorError> {
    let parsed = cli.validate_file(path, &ValidationMode::Parse).await?;
    if let Some(report) = parse_verdict(parsed) {
        return Ok(report);
    }

    let compiled = cli.validate_file(path, &compile_mode(target)).await?;
    Ok(compile_verdict(compiled))
}

fn compile_mode(target: &str) -> ValidationMode {
    ValidationMode::Compile {
        target: target.to_string(),
    }
}

/// A report when parsing failed, `None` when compile should run
fn parse_verdict(parsed: ValidationOutcome) -> Option<CheckReport> {
    let classified = classify(&parsed);
    if classified.is_success() {
        return None;
    }

    debug!("Parse failed ({}), skipping compile", classified.category);
    Some(CheckReport {
        stage: Stage::Parse,
        outcome: parsed,
        classified,
    })
}

fn compile_verdict(compiled: ValidationOutcome) -> CheckReport {
    let classified = classify(&compiled);
    CheckReport {
        stage: Stage::Compile,
        outcome: compiled,
        classified,
    }
}
