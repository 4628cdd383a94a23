//! Candidate generators
//!
//! A generator turns intent plus the attempts rejected so far into the next
//! model text to validate.

pub mod llm;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AccordoError, Result};
use crate::intent::StructuredIntent;
use crate::llm::LlmClient;
use crate::session::Attempt;

pub use self::llm::{HybridGenerator, LlmGenerator};

/// Produces model source text
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    /// `history` holds earlier rejected attempts, oldest first; empty on the first call
    async fn generate(&self, intent: &StructuredIntent, history: &[Attempt]) -> Result<String>;

    fn name(&self) -> &str;
}

/// Renders the intent directly. Deterministic: every attempt is identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

#[async_trait]
impl CandidateGenerator for TemplateGenerator {
    async fn generate(&self, intent: &StructuredIntent, _history: &[Attempt]) -> Result<String> {
        Ok(intent.to_cto())
    }

    fn name(&self) -> &str {
        "template"
    }
}

/// Which generator the pipeline uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Template,
    Llm,
    #[default]
    Hybrid,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Template => "template",
            Strategy::Llm => "llm",
            Strategy::Hybrid => "hybrid",
        }
    }

    /// Build the generator for this strategy
    pub fn build(&self, llm: Option<Arc<dyn LlmClient>>) -> Result<Arc<dyn CandidateGenerator>> {
        match (self, llm) {
            (Strategy::Template, _) => Ok(Arc::new(TemplateGenerator)),
            (Strategy::Llm, Some(llm)) => Ok(Arc::new(LlmGenerator::new(llm))),
            (Strategy::Hybrid, Some(llm)) => Ok(Arc::new(HybridGenerator::new(llm))),
            (strategy, None) => Err(AccordoError::Config(format!(
                "generation strategy '{}' needs an LLM client",
                strategy
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = AccordoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "template" => Ok(Strategy::Template),
            "llm" => Ok(Strategy::Llm),
            "hybrid" => Ok(Strategy::Hybrid),
            other => Err(AccordoError::Config(format!("unknown generation strategy '{}'", other))),
        }
    }
}
