//! LLM-backed generators.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::{AccordoError, Result};
use crate::intent::StructuredIntent;
use crate::llm::{CompletionRequest, LlmClient, strip_code_fences};
use crate::prompt::{PromptPair, Prompts};
use crate::session::Attempt;

use super::CandidateGenerator;

/// Asks the LLM for every attempt: the generator prompt first, the fix prompt after
pub struct LlmGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Prompts,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompts: Prompts::new(),
        }
    }

    async fn ask(&self, pair: PromptPair) -> Result<String> {
        let request = CompletionRequest::new(pair.system).with_user_message(pair.user);
        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| AccordoError::Generation(format!("LLM call failed: {}", e)))?;

        if response.finish_reason.is_truncated() {
            warn!("Model reply was truncated at the token limit");
        }

        let candidate = strip_code_fences(&response.content);
        if candidate.is_empty() {
            return Err(AccordoError::Generation("LLM returned an empty model".to_string()));
        }
        Ok(format!("{}\n", candidate))
    }

    /// Ask for a repaired model given the rejected attempts
    pub async fn repair(&self, history: &[Attempt]) -> Result<String> {
        let pair = self.prompts.fix(history)?;
        let candidate = self.ask(pair).await?;

        if let Some(latest) = history.last()
            && candidate.trim() == latest.candidate.trim()
        {
            warn!("Repair attempt returned the rejected model unchanged");
        }
        Ok(candidate)
    }
}

#[async_trait]
impl CandidateGenerator for LlmGenerator {
    async fn generate(&self, intent: &StructuredIntent, history: &[Attempt]) -> Result<String> {
        if history.is_empty() {
            debug!("Generating initial model for {} via {}", intent.namespace, self.llm.model());
            self.ask(self.prompts.generator(intent)?).await
        } else {
            debug!("Repairing attempt {} via {}", history.len(), self.llm.model());
            self.repair(history).await
        }
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Deterministic rendering first; LLM repair for later attempts
pub struct HybridGenerator {
    inner: LlmGenerator,
}

impl HybridGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            inner: LlmGenerator::new(llm),
        }
    }
}

#[async_trait]
impl CandidateGenerator for HybridGenerator {
    async fn generate(&self, intent: &StructuredIntent, history: &[Attempt]) -> Result<String> {
        if history.is_empty() {
            Ok(intent.to_cto())
        } else {
            self.inner.repair(history).await
        }
    }

    fn name(&self) -> &str {
        "hybrid"
    }
}
