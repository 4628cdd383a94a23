//! Async driver for a retry session.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::error::{AccordoError, Result};
use crate::generator::CandidateGenerator;
use crate::intent::StructuredIntent;
use crate::validation::{DEFAULT_TARGET, Validator, ValidatorError, check};

use super::state::{DEFAULT_MAX_ATTEMPTS, Phase, RetrySession, Step};

/// Settings for the repair loop
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Upper bound on generation calls per request
    pub max_attempts: u32,
    /// Compile target for the second validation stage
    pub target: String,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            target: DEFAULT_TARGET.to_string(),
        }
    }
}

impl RepairConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

/// What the driver does next, decided from the current phase
enum Action {
    Generate,
    Validate(String),
    Classify,
    Retry,
    Accept(String),
    GiveUp,
}

/// Generate → validate → classify → decide, until accepted or exhausted
pub struct RepairLoop {
    generator: Arc<dyn CandidateGenerator>,
    validator: Arc<dyn Validator>,
    config: RepairConfig,
}

impl RepairLoop {
    pub fn new(generator: Arc<dyn CandidateGenerator>, validator: Arc<dyn Validator>, config: RepairConfig) -> Self {
        Self {
            generator,
            validator,
            config,
        }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Produce a model that passes both validation stages.
    ///
    /// Content errors are retried up to `max_attempts` generations.
    /// Validator infrastructure failures and generator failures abort at once.
    pub async fn run(&self, intent: &StructuredIntent) -> Result<String> {
        let mut session = RetrySession::new(self.config.max_attempts);
        let id = session.id();

        info!(
            "[{}] Starting repair loop for {} with {} (max {} attempts)",
            id,
            intent.namespace,
            self.generator.name(),
            session.max_attempts()
        );
        session.advance(Step::Begin)?;

        loop {
            let action = match session.phase() {
                Phase::Init => return Err(AccordoError::InvalidState("session was not started".to_string())),
                Phase::Generating => Action::Generate,
                Phase::Validating { candidate } => Action::Validate(candidate.clone()),
                Phase::Classifying { .. } => Action::Classify,
                Phase::Repairing { classified, .. } => {
                    info!(
                        "[{}] Attempt {}/{} rejected: [{}] {}",
                        id,
                        session.attempt(),
                        session.max_attempts(),
                        classified.category,
                        classified.message
                    );
                    Action::Retry
                }
                Phase::Succeeded { candidate } => Action::Accept(candidate.clone()),
                Phase::FailedExhausted => Action::GiveUp,
            };

            match action {
                Action::Generate => {
                    debug!("[{}] Generating attempt {}", id, session.attempt());
                    let candidate = self
                        .generator
                        .generate(intent, session.history())
                        .await
                        .map_err(|e| match e {
                            AccordoError::Generation(_) => e,
                            other => AccordoError::Generation(other.to_string()),
                        })?;
                    session.advance(Step::Generated(candidate))?;
                }
                Action::Validate(candidate) => {
                    match check(self.validator.as_ref(), &candidate, &self.config.target).await {
                        Ok(report) => {
                            debug!("[{}] {} stage: {}", id, report.stage, report.classified.category);
                            session.advance(Step::Validated(report.outcome))?;
                        }
                        Err(ValidatorError::Environment(msg)) => {
                            error!("[{}] Validator unavailable, aborting: {}", id, msg);
                            return Err(AccordoError::Environment(msg));
                        }
                        Err(ValidatorError::Timeout(after)) => {
                            warn!("[validator-timeout] [{}] attempt {} aborted after {:?}", id, session.attempt(), after);
                            return Err(AccordoError::Timeout { after });
                        }
                    }
                }
                Action::Classify => {
                    session.advance(Step::Classify)?;
                }
                Action::Retry => {
                    session.advance(Step::Retry)?;
                }
                Action::Accept(candidate) => {
                    info!("[{}] Model accepted on attempt {}", id, session.attempt());
                    return Ok(candidate);
                }
                Action::GiveUp => {
                    let report = session.into_report()?;
                    warn!(
                        "[{}] Giving up after {} attempts: {}",
                        id,
                        report.attempts(),
                        report.last_error.message
                    );
                    return Err(AccordoError::Exhausted(Box::new(report)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{ConceptDefinition, FieldDefinition};
    use crate::session::Attempt;
    use crate::validation::{ErrorCategory, ValidationMode, ValidationOutcome};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const AST: &str = r#"{"$class":"concerto.metamodel@1.0.0.Model","declarations":[]}"#;
    const TYPE_ERROR: &str = r#"4:06 PM - error: Undeclared type "FakeType" in "property org.example@1.0.0.M.value""#;
    const COMPILED: &str = "info: Compiled to JSONSchema successfully.";

    fn intent() -> StructuredIntent {
        StructuredIntent::new("org.example")
            .with_concept(ConceptDefinition::new("M").with_field(FieldDefinition::new("value", "FakeType")))
    }

    /// Returns "candidate N" and records the history length it saw
    struct CountingGenerator {
        calls: AtomicU32,
        seen_history: Mutex<Vec<usize>>,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                seen_history: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CandidateGenerator for CountingGenerator {
        async fn generate(&self, _intent: &StructuredIntent, history: &[Attempt]) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen_history.lock().unwrap().push(history.len());
            Ok(format!("candidate {}", n))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl CandidateGenerator for FailingGenerator {
        async fn generate(&self, _intent: &StructuredIntent, _history: &[Attempt]) -> Result<String> {
            Err(AccordoError::Llm(crate::llm::LlmError::InvalidResponse("no choices".to_string())))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Compile results are scripted per call; parse always succeeds
    struct ScriptedValidator {
        compile: Mutex<Vec<std::result::Result<String, ValidatorError>>>,
        compile_calls: AtomicU32,
    }

    impl ScriptedValidator {
        fn new(compile: Vec<std::result::Result<&str, ValidatorError>>) -> Self {
            Self {
                compile: Mutex::new(compile.into_iter().rev().map(|r| r.map(str::to_string)).collect()),
                compile_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Validator for ScriptedValidator {
        async fn validate(
            &self,
            _source: &str,
            mode: &ValidationMode,
        ) -> std::result::Result<ValidationOutcome, ValidatorError> {
            match mode {
                ValidationMode::Parse => Ok(ValidationOutcome::from_text(mode.clone(), AST, Some(0))),
                ValidationMode::Compile { .. } => {
                    self.compile_calls.fetch_add(1, Ordering::SeqCst);
                    let next = self.compile.lock().unwrap().pop().unwrap_or(Ok(TYPE_ERROR.to_string()));
                    next.map(|text| ValidationOutcome::from_text(mode.clone(), text, Some(0)))
                }
            }
        }
    }

    fn repair_loop(
        generator: Arc<dyn CandidateGenerator>,
        validator: Arc<dyn Validator>,
        max_attempts: u32,
    ) -> RepairLoop {
        RepairLoop::new(generator, validator, RepairConfig::default().with_max_attempts(max_attempts))
    }

    #[tokio::test]
    async fn test_accepts_first_valid_candidate() {
        let generator = Arc::new(CountingGenerator::new());
        let validator = Arc::new(ScriptedValidator::new(vec![Ok(COMPILED)]));
        let result = repair_loop(generator.clone(), validator, 3).run(&intent()).await.unwrap();

        assert_eq!(result, "candidate 1");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_repairs_then_accepts() {
        let generator = Arc::new(CountingGenerator::new());
        let validator = Arc::new(ScriptedValidator::new(vec![Ok(TYPE_ERROR), Ok(COMPILED)]));
        let result = repair_loop(generator.clone(), validator, 3).run(&intent()).await.unwrap();

        assert_eq!(result, "candidate 2");
        assert_eq!(generator.calls(), 2);
        assert_eq!(*generator.seen_history.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_attempts() {
        let generator = Arc::new(CountingGenerator::new());
        let validator = Arc::new(ScriptedValidator::new(vec![Ok(TYPE_ERROR), Ok(TYPE_ERROR), Ok(TYPE_ERROR)]));
        let err = repair_loop(generator.clone(), validator, 3).run(&intent()).await.unwrap_err();

        match err {
            AccordoError::Exhausted(report) => {
                assert_eq!(report.attempts(), 3);
                assert_eq!(report.last_error.category, ErrorCategory::TypeError);
                assert_eq!(report.last_error.offending_name.as_deref(), Some("FakeType"));
                assert_eq!(report.history[0].candidate, "candidate 1");
                assert_eq!(report.trail().len(), 3);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_generation_calls_never_exceed_bound() {
        for max in 1..=5 {
            let generator = Arc::new(CountingGenerator::new());
            let validator = Arc::new(ScriptedValidator::new(vec![]));
            let result = repair_loop(generator.clone(), validator, max).run(&intent()).await;

            assert!(matches!(result, Err(AccordoError::Exhausted(_))));
            assert_eq!(generator.calls(), max);
        }
    }

    #[tokio::test]
    async fn test_environment_error_aborts_on_first_attempt() {
        let generator = Arc::new(CountingGenerator::new());
        let validator = Arc::new(ScriptedValidator::new(vec![Err(ValidatorError::Environment(
            "npx: not found".to_string(),
        ))]));
        let err = repair_loop(generator.clone(), validator.clone(), 3).run(&intent()).await.unwrap_err();

        assert!(matches!(err, AccordoError::Environment(ref msg) if msg == "npx: not found"));
        assert_eq!(generator.calls(), 1);
        assert_eq!(*generator.seen_history.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_environment_error_aborts_on_second_attempt() {
        let generator = Arc::new(CountingGenerator::new());
        let validator = Arc::new(ScriptedValidator::new(vec![
            Ok(TYPE_ERROR),
            Err(ValidatorError::Environment("gone".to_string())),
        ]));
        let err = repair_loop(generator.clone(), validator.clone(), 3).run(&intent()).await.unwrap_err();

        assert!(err.is_infrastructure());
        assert_eq!(generator.calls(), 2);
        assert_eq!(*generator.seen_history.lock().unwrap(), vec![0, 1]);
        assert_eq!(validator.compile_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_aborts_without_retry() {
        let generator = Arc::new(CountingGenerator::new());
        let validator = Arc::new(ScriptedValidator::new(vec![Err(ValidatorError::Timeout(Duration::from_secs(30)))]));
        let err = repair_loop(generator.clone(), validator, 3).run(&intent()).await.unwrap_err();

        assert!(matches!(err, AccordoError::Timeout { after } if after == Duration::from_secs(30)));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_aborts() {
        let validator = Arc::new(ScriptedValidator::new(vec![]));
        let err = repair_loop(Arc::new(FailingGenerator), validator.clone(), 3)
            .run(&intent())
            .await
            .unwrap_err();

        assert!(matches!(err, AccordoError::Generation(ref msg) if msg.contains("no choices")));
        assert_eq!(validator.compile_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_repair_config_builder() {
        let config = RepairConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.target, "JSONSchema");

        let config = config.with_max_attempts(5).with_target("Typescript");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.target, "Typescript");
    }
}
