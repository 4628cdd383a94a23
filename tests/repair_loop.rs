//! Repair loop integration tests
//!
//! Drives the full pipeline with a mock LLM client and a shell script that
//! stands in for the concerto CLI.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use accordo::AccordoError;
use accordo::analyst::{RequirementsAnalyst, UserRequest};
use accordo::generator::{CandidateGenerator, Strategy};
use accordo::llm::{LlmClient, MockLlmClient};
use accordo::session::{RepairConfig, RepairLoop};
use accordo::validation::{CliConfig, ConcertoCli, ErrorCategory, Stage, Validator, check, check_file};
use accordo::workflow::Workflow;
use tempfile::TempDir;

/// Parses anything, refuses to compile models that mention `FakeType`
const FAKE_CONCERTO: &str = r#"
case "$1" in
  parse) echo '{"$class":"concerto.metamodel@1.0.0.Model"}' ;;
  compile)
    if grep -q FakeType "$3"; then
      echo 'error: Undeclared type "FakeType" in "property org.example@1.0.0.Loan.amount"' 1>&2
      exit 1
    fi
    echo "info: Compiled to $5" ;;
esac
"#;

const LOAN_INTENT: &str = r#"{"namespace": "org.example.loan", "concepts": [{"name": "Loan", "fields": [{"name": "amount", "type": "double"}, {"name": "borrower", "type": "string"}]}]}"#;

const BROKEN_INTENT: &str = r#"{"namespace": "org.example", "concepts": [{"name": "Loan", "fields": [{"name": "amount", "type": "FakeType"}]}]}"#;

const BROKEN_MODEL: &str = "namespace org.example@1.0.0\n\nconcept Loan {\n  o FakeType amount\n}";

const FIXED_MODEL: &str = "namespace org.example@1.0.0\n\nconcept Loan {\n  o Double amount\n}";

fn fake_cli(script: &str) -> ConcertoCli {
    ConcertoCli::new(CliConfig::new("sh").with_args(["-c", script, "fake-concerto"]))
}

fn workflow(llm: Arc<MockLlmClient>, strategy: Strategy, cli: ConcertoCli, dir: &TempDir) -> Workflow {
    let llm: Arc<dyn LlmClient> = llm;
    let generator: Arc<dyn CandidateGenerator> = strategy.build(Some(llm.clone())).unwrap();
    let validator: Arc<dyn Validator> = Arc::new(cli);
    let repair_loop = RepairLoop::new(generator, validator, RepairConfig::default());
    Workflow::new(RequirementsAnalyst::new(llm), repair_loop, dir.path())
}

/// Integration test: first candidate valid, model saved, one LLM call
#[tokio::test]
async fn test_valid_first_attempt_saves_model() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::with_texts([LOAN_INTENT]));
    let workflow = workflow(llm.clone(), Strategy::Hybrid, fake_cli(FAKE_CONCERTO), &dir);

    let report = workflow
        .run(&UserRequest::new("A loan agreement with amount and borrower"), true)
        .await
        .unwrap();

    assert!(report.model.starts_with("namespace org.example.loan@1.0.0"));
    assert!(report.model.contains("o Double amount"));
    assert!(report.model.contains("o String borrower"));

    let saved = report.saved_to.unwrap();
    assert_eq!(saved, dir.path().join("org_example_loan.cto"));
    assert_eq!(std::fs::read_to_string(saved).unwrap(), report.model);
    assert_eq!(llm.call_count(), 1);
}

/// Integration test: type error repaired by the LLM on the second attempt
#[tokio::test]
async fn test_type_error_repaired_on_second_attempt() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::with_texts([BROKEN_INTENT, FIXED_MODEL]));
    let workflow = workflow(llm.clone(), Strategy::Hybrid, fake_cli(FAKE_CONCERTO), &dir);

    let report = workflow
        .run(&UserRequest::new("A loan agreement with an amount"), false)
        .await
        .unwrap();

    assert_eq!(report.model, format!("{}\n", FIXED_MODEL));
    assert_eq!(llm.call_count(), 2);

    // The repair prompt carries the rejected candidate and the classified feedback
    let requests = llm.requests();
    let repair_prompt = &requests[1].messages[0].content;
    assert!(repair_prompt.contains("o FakeType amount"));
    assert!(repair_prompt.contains("type_error"));
    assert!(repair_prompt.contains("FakeType"));
}

/// Integration test: every attempt rejected, the report lists each one
#[tokio::test]
async fn test_exhaustion_reports_every_attempt() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::with_texts([BROKEN_INTENT, BROKEN_MODEL, BROKEN_MODEL]));
    let workflow = workflow(llm.clone(), Strategy::Hybrid, fake_cli(FAKE_CONCERTO), &dir);

    let err = workflow
        .run(&UserRequest::new("A loan agreement with an amount"), true)
        .await
        .unwrap_err();

    match err {
        AccordoError::Exhausted(report) => {
            assert_eq!(report.attempts(), 3);
            assert_eq!(report.last_error.category, ErrorCategory::TypeError);
            assert_eq!(report.last_error.offending_name.as_deref(), Some("FakeType"));
            assert_eq!(report.trail().len(), 3);
            assert!(report.trail()[0].starts_with("attempt 1: [type_error]"));
        }
        other => panic!("Expected Exhausted, got {:?}", other),
    }
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

/// Integration test: a missing validator aborts without retrying
#[tokio::test]
async fn test_missing_validator_aborts_run() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::with_texts([LOAN_INTENT]));
    let cli = ConcertoCli::new(CliConfig::new("/nonexistent/concerto"));
    let workflow = workflow(llm.clone(), Strategy::Hybrid, cli, &dir);

    let err = workflow
        .run(&UserRequest::new("A loan agreement with amount and borrower"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, AccordoError::Environment(_)));
    assert!(err.is_infrastructure());
    assert_eq!(llm.call_count(), 1);
}

/// Integration test: a hung validator is bounded by its timeout
#[tokio::test]
async fn test_hung_validator_times_out() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::with_texts([LOAN_INTENT]));
    let cli = ConcertoCli::new(
        CliConfig::new("sh")
            .with_args(["-c", "sleep 30", "fake-concerto"])
            .with_timeout(Duration::from_millis(200)),
    );
    let workflow = workflow(llm, Strategy::Template, cli, &dir);

    let started = std::time::Instant::now();
    let err = workflow
        .run(&UserRequest::new("A loan agreement with amount and borrower"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, AccordoError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

/// Integration test: the template strategy never asks the LLM to repair
#[tokio::test]
async fn test_template_strategy_repeats_rendering() {
    let dir = TempDir::new().unwrap();
    let llm = Arc::new(MockLlmClient::with_texts([BROKEN_INTENT]));
    let workflow = workflow(llm.clone(), Strategy::Template, fake_cli(FAKE_CONCERTO), &dir);

    let err = workflow
        .run(&UserRequest::new("A loan agreement with an amount"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, AccordoError::Exhausted(_)));
    assert_eq!(llm.call_count(), 1);
}

/// Integration test: syntax errors stop at the parse stage
#[tokio::test]
async fn test_syntax_error_stops_at_parse() {
    let script = r#"
case "$1" in
  parse) echo 'error: Expected "{" but "c" found. Line 3 column 1' 1>&2; exit 1 ;;
  compile) echo "compile should not run" ;;
esac
"#;
    let report = check(&fake_cli(script), "namespace a@1.0.0\nconcept", "JSONSchema")
        .await
        .unwrap();

    assert_eq!(report.stage, Stage::Parse);
    assert_eq!(report.classified.category, ErrorCategory::SyntaxError);
    assert!(report.classified.details().iter().any(|d| d.starts_with("Expected")));
}

/// Integration test: file checks go through both stages in place
#[tokio::test]
async fn test_check_existing_file() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.cto");
    let bad = dir.path().join("bad.cto");
    std::fs::write(&good, FIXED_MODEL).unwrap();
    std::fs::write(&bad, BROKEN_MODEL).unwrap();

    let cli = fake_cli(FAKE_CONCERTO);

    let report = check_file(&cli, &good, "JSONSchema").await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.stage, Stage::Compile);

    let report = check_file(&cli, &bad, "JSONSchema").await.unwrap();
    assert_eq!(report.classified.category, ErrorCategory::TypeError);
    assert_eq!(report.classified.property_path.as_deref(), Some("org.example@1.0.0.Loan.amount"));
}

/// Integration test: a compile that only writes its schema is accepted
#[tokio::test]
async fn test_silent_compile_with_output_is_valid() {
    let script = r#"
case "$1" in
  parse) echo '{"$class":"concerto.metamodel@1.0.0.Model"}' ;;
  compile) echo '{"type":"object"}' > "$7/schema.json" ;;
esac
"#;
    let report = check(&fake_cli(script), FIXED_MODEL, "JSONSchema").await.unwrap();

    assert_eq!(report.stage, Stage::Compile);
    assert!(report.outcome.artifact_produced);
    assert!(report.is_success());
}
