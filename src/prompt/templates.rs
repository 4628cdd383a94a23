//! Prompt templates for extraction, generation and repair.

use serde_json::json;

use crate::error::Result;
use crate::intent::StructuredIntent;
use crate::session::Attempt;

use super::render::PromptRenderer;

pub const ANALYST_SYSTEM: &str = r#"You are a requirements analyst for legal contracts and business agreements.

Read a plain-language description of a contract or business model and extract the structure needed to write a Concerto model.

## Output Format
Reply with one JSON object:
- namespace: reverse domain name, lowercase (e.g. "org.example.loan")
- version: "1.0.0"
- concepts: array of concepts

Each concept has:
- name: PascalCase (e.g. "LoanAgreement")
- description: one sentence
- fields: array of fields

Each field has:
- name: camelCase (e.g. "borrowerName")
- type: one of String, Integer, Long, Double, Boolean, DateTime, or the name of another concept in the reply
- description: one sentence
- optional: true or false (default false)
- is_array: true or false (default false)

## Type Hints
| Description mentions | Type |
|----------------------|------|
| name, title, text, address | String |
| count, quantity, days, months, years | Integer |
| price, rate, amount, percentage | Double |
| date, time, created, updated | DateTime |
| yes/no, active, enabled, is/has | Boolean |
| "list of", "multiple" | is_array: true |
| "optional", "if provided" | optional: true |

## Example
Input: "A loan agreement with borrower name, loan amount, interest rate, and optional start date"

Output:
{"namespace": "org.example.loan", "version": "1.0.0", "concepts": [{"name": "LoanAgreement", "description": "A loan between two parties", "fields": [{"name": "borrowerName", "type": "String", "description": "Name of the borrower", "optional": false, "is_array": false}, {"name": "loanAmount", "type": "Double", "description": "Principal amount", "optional": false, "is_array": false}, {"name": "interestRate", "type": "Double", "description": "Annual interest rate in percent", "optional": false, "is_array": false}, {"name": "startDate", "type": "DateTime", "description": "When the loan starts", "optional": true, "is_array": false}]}]}

## Rules
1. Output JSON only. No markdown, no commentary.
2. Fields are required unless the description says otherwise.
3. Pick a namespace that matches the domain."#;

pub const ANALYST_USER: &str = r#"Extract structured model requirements from this description.

Description:
{{description}}
{{#if context}}

Additional context: {{context}}
{{/if}}

Reply with ONLY the JSON object."#;

pub const GENERATOR_SYSTEM: &str = r#"You write Concerto (.cto) model files from structured intent.

## Syntax
namespace org.example.model@1.0.0

concept ConceptName {
  o String fieldName
  o Integer count optional
  o Double[] values
}

- Every property line starts with a lowercase "o".
- Array types end with [].
- Optional properties end with the keyword optional.
- Primitive types: String, Integer, Long, Double, Boolean, DateTime.
- Any other type must be declared in the same file or imported.

## Rules
1. Begin with the namespace line, including the version.
2. Leave one blank line between the namespace and the declarations.
3. Indent properties by two spaces.
4. Reply with the raw model text only. No markdown fences, no commentary."#;

pub const GENERATOR_USER: &str = r#"Write a Concerto model for this structured intent:

{{intent}}

Reply with ONLY the raw model text."#;

pub const FIX_USER: &str = r#"The Concerto model below failed validation. Correct it.

Current model:
{{candidate}}

Validation result:
{{feedback}}
{{#if earlier}}

## Previous Attempts
{{#each earlier}}
- Attempt {{number}}: [{{category}}] {{message}}
{{/each}}
Do not repeat these mistakes.
{{/if}}

Reply with ONLY the corrected raw model text."#;

/// A rendered (system, user) prompt pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Builds every prompt the pipeline sends
pub struct Prompts {
    renderer: PromptRenderer,
}

impl Default for Prompts {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompts {
    pub fn new() -> Self {
        Self {
            renderer: PromptRenderer::new(),
        }
    }

    /// Prompt for extracting structured intent from prose
    pub fn analyst(&self, description: &str, context: Option<&str>) -> Result<PromptPair> {
        let user = self.renderer.render_with(
            ANALYST_USER,
            &json!({
                "description": description,
                "context": context.filter(|c| !c.trim().is_empty()),
            }),
        )?;

        Ok(PromptPair {
            system: ANALYST_SYSTEM.to_string(),
            user,
        })
    }

    /// Prompt for a first model from intent
    pub fn generator(&self, intent: &StructuredIntent) -> Result<PromptPair> {
        let intent_json = serde_json::to_string_pretty(intent)?;
        let user = self.renderer.render_with(GENERATOR_USER, &json!({ "intent": intent_json }))?;

        Ok(PromptPair {
            system: GENERATOR_SYSTEM.to_string(),
            user,
        })
    }

    /// Prompt for repairing the latest rejected attempt. `history` must not be empty.
    pub fn fix(&self, history: &[Attempt]) -> Result<PromptPair> {
        let Some((latest, earlier)) = history.split_last() else {
            return Err(crate::error::AccordoError::InvalidState(
                "fix prompt needs at least one attempt".to_string(),
            ));
        };

        let earlier: Vec<_> = earlier
            .iter()
            .map(|a| {
                json!({
                    "number": a.number,
                    "category": a.classified.category.as_str(),
                    "message": a.classified.message,
                })
            })
            .collect();

        let user = self.renderer.render_with(
            FIX_USER,
            &json!({
                "candidate": latest.candidate,
                "feedback": latest.classified.format_for_prompt(),
                "earlier": earlier,
            }),
        )?;

        Ok(PromptPair {
            system: GENERATOR_SYSTEM.to_string(),
            user,
        })
    }
}
