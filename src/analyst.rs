//! Requirements analysis: prose → structured intent via the LLM.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AccordoError, Result};
use crate::intent::{
    ConceptDefinition, DEFAULT_NAMESPACE, DEFAULT_VERSION, FieldDefinition, StructuredIntent, normalize_type,
    to_camel_case, to_pascal_case,
};
use crate::llm::{CompletionRequest, LlmClient, extract_json};
use crate::prompt::Prompts;

/// Descriptions shorter than this are rejected before calling the LLM
pub const MIN_DESCRIPTION_LEN: usize = 10;

/// A user's request for a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRequest {
    pub description: String,
    #[serde(default)]
    pub preferred_namespace: Option<String>,
    #[serde(default)]
    pub additional_context: Option<String>,
}

impl UserRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            preferred_namespace: None,
            additional_context: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.preferred_namespace = Some(namespace.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.description.trim().chars().count() < MIN_DESCRIPTION_LEN {
            return Err(AccordoError::Analysis(format!(
                "description must be at least {} characters",
                MIN_DESCRIPTION_LEN
            )));
        }
        Ok(())
    }
}

/// Extracts structured intent from a natural-language description
pub struct RequirementsAnalyst {
    llm: Arc<dyn LlmClient>,
    prompts: Prompts,
}

impl RequirementsAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompts: Prompts::new(),
        }
    }

    pub async fn analyze(&self, request: &UserRequest) -> Result<StructuredIntent> {
        request.validate()?;
        info!("Analyzing requirements ({} chars)", request.description.len());

        let pair = self
            .prompts
            .analyst(&request.description, request.additional_context.as_deref())?;
        let completion = CompletionRequest::new(pair.system).with_user_message(pair.user).json();

        let response = self
            .llm
            .complete(completion)
            .await
            .map_err(|e| AccordoError::Analysis(format!("LLM call failed: {}", e)))?;
        if response.finish_reason.is_truncated() {
            warn!("Analyst reply was truncated at the token limit");
        }

        let data = extract_json(&response.content)
            .map_err(|e| AccordoError::Analysis(format!("reply is not JSON: {}", e)))?;

        let mut intent = intent_from_json(&data)?;
        if let Some(namespace) = request.preferred_namespace.as_deref().filter(|n| !n.trim().is_empty()) {
            debug!("Using preferred namespace {}", namespace);
            intent.namespace = namespace.trim().to_string();
        }

        intent
            .validate()
            .map_err(|e| AccordoError::Analysis(format!("extracted intent is invalid: {}", e)))?;

        let undeclared = intent.undeclared_types();
        if !undeclared.is_empty() {
            warn!("Intent references undeclared types: {}", undeclared.join(", "));
        }

        info!(
            "Extracted {} concept(s) with {} field(s) in {}",
            intent.concepts.len(),
            intent.field_count(),
            intent.namespace
        );
        Ok(intent)
    }
}

fn str_field<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn opt_str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Build normalized intent from loosely shaped LLM JSON
pub fn intent_from_json(data: &Value) -> Result<StructuredIntent> {
    if !data.is_object() {
        return Err(AccordoError::Analysis("expected a JSON object".to_string()));
    }

    let concepts: Vec<ConceptDefinition> = data
        .get("concepts")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|c| {
                    let fields = c
                        .get("fields")
                        .and_then(Value::as_array)
                        .map(|fields| {
                            fields
                                .iter()
                                .map(|f| FieldDefinition {
                                    name: to_camel_case(str_field(f, "name", "unknown")),
                                    type_name: normalize_type(str_field(f, "type", "String")),
                                    description: opt_str_field(f, "description"),
                                    optional: bool_field(f, "optional"),
                                    is_array: bool_field(f, "is_array"),
                                })
                                .collect()
                        })
                        .unwrap_or_default();

                    ConceptDefinition {
                        name: to_pascal_case(str_field(c, "name", "UnnamedConcept")),
                        description: opt_str_field(c, "description"),
                        fields,
                        is_abstract: bool_field(c, "is_abstract"),
                        extends: opt_str_field(c, "extends").map(|p| to_pascal_case(&p)),
                        identified_by: opt_str_field(c, "identified_by").map(|f| to_camel_case(&f)),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    if concepts.is_empty() {
        return Err(AccordoError::Analysis("no concepts found in reply".to_string()));
    }

    let imports = data
        .get("imports")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Ok(StructuredIntent {
        namespace: str_field(data, "namespace", DEFAULT_NAMESPACE).to_string(),
        version: str_field(data, "version", DEFAULT_VERSION).to_string(),
        concepts,
        imports,
    })
}
