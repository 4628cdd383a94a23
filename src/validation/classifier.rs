//! Classification of raw validator output.
//!
//! The concerto CLI reports errors as text and frequently exits 0 while doing
//! so. Classification therefore reads only the text: the exit code is carried
//! along for diagnostics but never decides the category.
//!
//! Rules are ordered and the first match wins:
//! 1. no `error` anywhere, and a success marker, an AST or compile output files → success
//! 2. `Undeclared type` → type error
//! 3. `Unable to resolve` → import error
//! 4. `error:` together with `expected` → syntax error
//! 5. any other `error:` → unknown error with the full message
//! 6. nothing recognizable → unknown error with a synthetic message

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::outcome::ValidationOutcome;

static ERROR_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)error:").expect("valid regex"));

/// Any mention of an error rules out success, with or without the colon
static ERROR_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)error").expect("valid regex"));

static SUCCESS_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)compiled to").expect("valid regex"));

static EXPECTED_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)expected").expect("valid regex"));

static UNDECLARED_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)undeclared type[^"]*(?:"([^"]*)")?(?:\s+in\s+"([^"]*)")?"#).expect("valid regex")
});

static UNRESOLVED_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)unable to resolve[^"]*(?:"([^"]*)")?"#).expect("valid regex"));

static LINE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bline\s*(\d+)").expect("valid regex"));

static EXPECTED_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)expected\s*(.+?)\s*(?:\bbut\b|$)").expect("valid regex"));

/// Closed set of validation verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Success,
    SyntaxError,
    TypeError,
    ImportError,
    UnknownError,
}

impl ErrorCategory {
    /// Get a machine-friendly name for the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Success => "success",
            ErrorCategory::SyntaxError => "syntax_error",
            ErrorCategory::TypeError => "type_error",
            ErrorCategory::ImportError => "import_error",
            ErrorCategory::UnknownError => "unknown_error",
        }
    }

    /// Fixed remediation hint for the category.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ErrorCategory::Success => None,
            ErrorCategory::SyntaxError => {
                Some("Check for missing or unbalanced braces '{' '}' and misspelled keywords in your declarations")
            }
            ErrorCategory::TypeError => Some(
                "Use a primitive type (String, Integer, Long, Double, Boolean, DateTime) or define the type first",
            ),
            ErrorCategory::ImportError => Some(
                "Verify the imported namespace is resolvable, or run offline by declaring the types locally",
            ),
            ErrorCategory::UnknownError => Some("No actionable suggestion; review the raw validator output"),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validator outcome reduced to a category and the details worth keeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,

    /// Error line, full message, or a synthetic note when nothing was parseable
    pub message: String,

    /// Undeclared type name (type errors) or unresolved name (import errors)
    pub offending_name: Option<String>,

    /// Dotted property path the type error was reported in
    pub property_path: Option<String>,

    pub suggestion: Option<String>,

    /// Exit code of the invocation, kept for diagnostics
    pub exit_code: Option<i32>,
}

impl ClassifiedError {
    fn new(category: ErrorCategory, message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            category,
            message: message.into(),
            offending_name: None,
            property_path: None,
            suggestion: category.suggestion().map(str::to_string),
            exit_code,
        }
    }

    /// Classification-layer view of a validator timeout
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorCategory::UnknownError,
            format!("validator timed out after {:?}; no output was classified", after),
            None,
        )
    }

    pub fn is_success(&self) -> bool {
        self.category == ErrorCategory::Success
    }

    /// Actionable fragments pulled out of the message.
    pub fn details(&self) -> Vec<String> {
        let mut details = Vec::new();

        if let Some(caps) = LINE_NUMBER.captures(&self.message) {
            details.push(format!("Error on line {}", &caps[1]));
        }
        if let Some(caps) = EXPECTED_FRAGMENT.captures(&self.message) {
            details.push(format!("Expected: {}", caps[1].trim()));
        }
        if let Some(name) = &self.offending_name {
            match self.category {
                ErrorCategory::ImportError => details.push(format!("Unresolved: {}", name)),
                _ => details.push(format!("Unknown type: {}", name)),
            }
        }
        if let Some(path) = &self.property_path {
            details.push(format!("In property: {}", path));
        }

        details
    }

    /// Format the classification for inclusion in a repair prompt
    pub fn format_for_prompt(&self) -> String {
        let mut output = format!("**Category:** {}\n**Error:** {}\n", self.category, self.message);

        let details = self.details();
        if !details.is_empty() {
            output.push_str(&format!("**Details:** {}\n", details.join(" | ")));
        }
        if let Some(suggestion) = &self.suggestion {
            output.push_str(&format!("**Suggestion:** {}\n", suggestion));
        }

        output
    }
}

/// Classify one validator outcome. Pure and deterministic.
pub fn classify(outcome: &ValidationOutcome) -> ClassifiedError {
    let raw = outcome.raw_output.as_str();
    let exit_code = outcome.exit_code;
    let has_error = ERROR_MARKER.is_match(raw);

    let produced = SUCCESS_MARKER.is_match(raw) || looks_like_ast(raw) || outcome.artifact_produced;
    if !ERROR_WORD.is_match(raw) && produced {
        let summary = match raw.lines().find(|l| !l.trim().is_empty()) {
            Some(line) => line.trim().to_string(),
            None => format!("{} wrote output files without reporting errors", outcome.mode),
        };
        return ClassifiedError::new(ErrorCategory::Success, summary, exit_code);
    }

    if let Some(caps) = UNDECLARED_TYPE.captures(raw) {
        let mut classified = ClassifiedError::new(ErrorCategory::TypeError, error_line(raw, caps.get(0)), exit_code);
        classified.offending_name = caps.get(1).map(|m| m.as_str().to_string());
        classified.property_path = caps.get(2).map(|m| property_path(m.as_str()));
        return classified;
    }

    if let Some(caps) = UNRESOLVED_IMPORT.captures(raw) {
        let mut classified =
            ClassifiedError::new(ErrorCategory::ImportError, error_line(raw, caps.get(0)), exit_code);
        classified.offending_name = caps.get(1).map(|m| m.as_str().to_string());
        return classified;
    }

    if has_error && EXPECTED_MARKER.is_match(raw) {
        return ClassifiedError::new(ErrorCategory::SyntaxError, error_line(raw, None), exit_code);
    }

    if has_error {
        return ClassifiedError::new(ErrorCategory::UnknownError, raw.trim(), exit_code);
    }

    ClassifiedError::new(ErrorCategory::UnknownError, unparseable_message(raw, exit_code), exit_code)
}

/// `concerto parse` prints the model AST as a JSON object on success
fn looks_like_ast(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with('{')
        && serde_json::from_str::<serde_json::Value>(trimmed)
            .map(|v| v.is_object())
            .unwrap_or(false)
}

/// The line carrying the error: the line containing the matched marker,
/// else the first `error:` line.
fn error_line(raw: &str, marker: Option<regex::Match<'_>>) -> String {
    if let Some(m) = marker {
        let start = raw[..m.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let end = raw[m.start()..].find('\n').map(|i| m.start() + i).unwrap_or(raw.len());
        return raw[start..end].trim().to_string();
    }
    if let Some(line) = raw.lines().find(|l| ERROR_MARKER.is_match(l)) {
        return line.trim().to_string();
    }
    raw.trim().to_string()
}

fn property_path(location: &str) -> String {
    location.trim().strip_prefix("property ").unwrap_or(location.trim()).trim().to_string()
}

fn unparseable_message(raw: &str, exit_code: Option<i32>) -> String {
    let reason = match exit_code {
        Some(1) => "exit code 1, file-system-level failure".to_string(),
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };

    if raw.trim().is_empty() {
        format!("Validator produced no parseable message ({}, empty output)", reason)
    } else {
        let preview: String = raw.trim().chars().take(200).collect();
        format!("Validator produced no parseable message ({}): {}", reason, preview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::outcome::ValidationMode;

    fn outcome(raw: &str, exit_code: i32) -> ValidationOutcome {
        ValidationOutcome::from_text(ValidationMode::compile(), raw, Some(exit_code))
    }

    #[test]
    fn test_undeclared_type_scenario() {
        let raw = r#"4:06 PM - error: Undeclared type "FakeType" in "property org.example@1.0.0.M.value""#;
        let classified = classify(&outcome(raw, 0));

        assert_eq!(classified.category, ErrorCategory::TypeError);
        assert_eq!(classified.offending_name.as_deref(), Some("FakeType"));
        assert_eq!(classified.property_path.as_deref(), Some("org.example@1.0.0.M.value"));
        assert!(classified.suggestion.as_deref().unwrap().contains("primitive type"));
    }

    #[test]
    fn test_undeclared_type_independent_of_exit_code() {
        for name in ["X", "Money", "org.acme.Thing"] {
            let raw = format!(r#"error: Undeclared type "{}" in "property a.b@1.0.0.C.d""#, name);
            let zero = classify(&outcome(&raw, 0));
            let one = classify(&outcome(&raw, 1));
            let killed = classify(&ValidationOutcome::from_text(ValidationMode::compile(), raw.clone(), None));

            for classified in [zero, one, killed] {
                assert_eq!(classified.category, ErrorCategory::TypeError);
                assert_eq!(classified.offending_name.as_deref(), Some(name));
            }
        }
    }

    #[test]
    fn test_expected_brace_scenario() {
        let raw = r#"4:04 PM - error: Expected "}" but end of input found."#;
        let classified = classify(&outcome(raw, 0));

        assert_eq!(classified.category, ErrorCategory::SyntaxError);
        assert_eq!(classified.message, raw);
        assert!(classified.offending_name.is_none());
    }

    #[test]
    fn test_compiled_success_scenario() {
        let classified = classify(&outcome("info: Compiled to JSONSchema successfully.", 0));
        assert_eq!(classified.category, ErrorCategory::Success);
        assert!(classified.is_success());
        assert!(classified.suggestion.is_none());
    }

    #[test]
    fn test_success_regardless_of_exit_code() {
        for code in [0, 1, 2, 127] {
            let classified = classify(&outcome("info: Compiled to JSONSchema successfully.", code));
            assert_eq!(classified.category, ErrorCategory::Success);
        }
    }

    #[test]
    fn test_parse_ast_is_success() {
        let raw = r#"{"$class":"concerto.metamodel@1.0.0.Model","namespace":"org.test@1.0.0","declarations":[]}"#;
        let classified = classify(&ValidationOutcome::from_text(ValidationMode::Parse, raw, Some(0)));
        assert_eq!(classified.category, ErrorCategory::Success);
    }

    #[test]
    fn test_malformed_json_is_not_success() {
        let classified = classify(&ValidationOutcome::from_text(ValidationMode::Parse, "{ not json", Some(0)));
        assert_eq!(classified.category, ErrorCategory::UnknownError);
    }

    #[test]
    fn test_unable_to_resolve_is_import_error() {
        let raw = r#"error: Unable to resolve "org.accordproject.money@0.3.0.MonetaryAmount""#;
        let classified = classify(&outcome(raw, 0));

        assert_eq!(classified.category, ErrorCategory::ImportError);
        assert_eq!(
            classified.offending_name.as_deref(),
            Some("org.accordproject.money@0.3.0.MonetaryAmount")
        );
        assert!(classified.property_path.is_none());
    }

    #[test]
    fn test_type_error_takes_precedence_over_syntax() {
        let raw = r#"error: Undeclared type "Foo", expected a declared type"#;
        let classified = classify(&outcome(raw, 0));
        assert_eq!(classified.category, ErrorCategory::TypeError);
        assert_eq!(classified.offending_name.as_deref(), Some("Foo"));
    }

    #[test]
    fn test_error_marker_is_case_insensitive() {
        let classified = classify(&outcome("ERROR: Expected identifier", 0));
        assert_eq!(classified.category, ErrorCategory::SyntaxError);
    }

    #[test]
    fn test_error_marker_blocks_success() {
        let raw = "info: Compiled to JSONSchema\nerror: something else broke";
        let classified = classify(&outcome(raw, 0));
        assert_eq!(classified.category, ErrorCategory::UnknownError);
        assert_eq!(classified.message, raw);
    }

    #[test]
    fn test_error_word_without_colon_blocks_success() {
        let classified = classify(&outcome("info: Compiled to JSONSchema. 2 errors ignored", 0));
        assert!(!classified.is_success());
        assert_eq!(classified.category, ErrorCategory::UnknownError);

        let ast = r#"{"$class":"concerto.metamodel@1.0.0.Model","note":"Error recovery used"}"#;
        assert!(!classify(&outcome(ast, 0)).is_success());
    }

    #[test]
    fn test_output_files_without_text_is_success() {
        let written = outcome("", 0).with_artifact(true);
        let classified = classify(&written);
        assert_eq!(classified.category, ErrorCategory::Success);
        assert!(classified.message.contains("wrote output files"));

        // Files on disk do not override a reported error
        let raw = r#"error: Undeclared type "FakeType" in "property a@1.0.0.M.v""#;
        assert_eq!(classify(&outcome(raw, 0).with_artifact(true)).category, ErrorCategory::TypeError);

        assert!(!classify(&outcome("", 0)).is_success());
    }

    #[test]
    fn test_message_is_the_line_with_the_marker() {
        let raw = "error:\nUndeclared type \"Money\" in \"property a@1.0.0.Loan.amount\"";
        let classified = classify(&outcome(raw, 1));
        assert_eq!(classified.category, ErrorCategory::TypeError);
        assert_eq!(classified.message, r#"Undeclared type "Money" in "property a@1.0.0.Loan.amount""#);

        let raw = "error: model failed\nUnable to resolve \"org.acme@1.0.0.Party\"";
        let classified = classify(&outcome(raw, 0));
        assert_eq!(classified.category, ErrorCategory::ImportError);
        assert_eq!(classified.message, r#"Unable to resolve "org.acme@1.0.0.Party""#);
    }

    #[test]
    fn test_fallback_error_keeps_full_message() {
        let raw = "3:00 PM - error: Duplicate declaration Foo\n  at model.cto";
        let classified = classify(&outcome(raw, 0));
        assert_eq!(classified.category, ErrorCategory::UnknownError);
        assert_eq!(classified.message, raw);
    }

    #[test]
    fn test_empty_output_nonzero_exit() {
        let classified = classify(&outcome("", 1));
        assert_eq!(classified.category, ErrorCategory::UnknownError);
        assert!(classified.message.contains("no parseable message"));
        assert!(classified.message.contains("file-system-level"));
        assert_eq!(classified.exit_code, Some(1));
    }

    #[test]
    fn test_unrecognized_text_zero_exit() {
        let classified = classify(&outcome("Done.", 0));
        assert_eq!(classified.category, ErrorCategory::UnknownError);
        assert!(classified.message.contains("Done."));
    }

    #[test]
    fn test_classify_is_idempotent() {
        let samples = [
            r#"error: Undeclared type "FakeType" in "property org.example@1.0.0.M.value""#,
            r#"error: Expected "}" but end of input found."#,
            "info: Compiled to JSONSchema successfully.",
            "",
        ];
        for raw in samples {
            let o = outcome(raw, 0);
            assert_eq!(classify(&o), classify(&o));
        }
    }

    #[test]
    fn test_suggestion_table() {
        assert!(ErrorCategory::Success.suggestion().is_none());
        assert!(ErrorCategory::SyntaxError.suggestion().unwrap().contains("braces"));
        assert!(ErrorCategory::ImportError.suggestion().unwrap().contains("offline"));
        assert!(ErrorCategory::UnknownError.suggestion().unwrap().contains("raw"));
    }

    #[test]
    fn test_details_extraction() {
        let classified = classify(&outcome(r#"error: Expected "}" but end of input found. line 7"#, 0));
        let details = classified.details();
        assert!(details.contains(&"Error on line 7".to_string()));
        assert!(details.iter().any(|d| d.starts_with("Expected: \"}\"")));

        let classified = classify(&outcome(r#"error: Undeclared type "FakeType" in "property a.b@1.0.0.M.v""#, 0));
        let details = classified.details();
        assert!(details.contains(&"Unknown type: FakeType".to_string()));
        assert!(details.contains(&"In property: a.b@1.0.0.M.v".to_string()));
    }

    #[test]
    fn test_timeout_classification() {
        let classified = ClassifiedError::timeout(Duration::from_secs(30));
        assert_eq!(classified.category, ErrorCategory::UnknownError);
        assert!(classified.message.contains("timed out"));
    }

    #[test]
    fn test_format_for_prompt() {
        let classified = classify(&outcome(r#"error: Undeclared type "FakeType""#, 0));
        let formatted = classified.format_for_prompt();
        assert!(formatted.contains("**Category:** type_error"));
        assert!(formatted.contains("Unknown type: FakeType"));
        assert!(formatted.contains("**Suggestion:**"));
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ErrorCategory::TypeError).unwrap();
        assert_eq!(json, "\"type_error\"");
    }
}
