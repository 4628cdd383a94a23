//! Structured intent: the JSON-shaped description of a model
//!
//! Extraction produces a `StructuredIntent`; generation turns it into
//! Concerto source text. `to_cto()` is the deterministic rendering used as the
//! first candidate.

pub mod normalize;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AccordoError, Result};

pub use normalize::{normalize_type, to_camel_case, to_pascal_case};

pub const DEFAULT_NAMESPACE: &str = "org.example.generated";
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Primitive types understood by Concerto
pub const PRIMITIVE_TYPES: [&str; 6] = ["String", "Integer", "Long", "Double", "Boolean", "DateTime"];

static NAMESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(\.[a-z][a-z0-9]*)*$").expect("valid regex"));
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("valid regex"));
static PASCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$").expect("valid regex"));
static CAMEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("valid regex"));

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// One field of a concept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// camelCase field name
    pub name: String,

    /// Concerto type: a primitive or a declared concept
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub is_array: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            description: None,
            optional: false,
            is_array: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Render as a `o Type name` property line
    pub fn to_cto_line(&self) -> String {
        let array = if self.is_array { "[]" } else { "" };
        let optional = if self.optional { " optional" } else { "" };
        format!("  o {}{} {}{}", self.type_name, array, self.name, optional)
    }
}

/// A concept declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptDefinition {
    /// PascalCase concept name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldDefinition>,

    #[serde(default)]
    pub is_abstract: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identified_by: Option<String>,
}

impl ConceptDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
            is_abstract: false,
            extends: None,
            identified_by: None,
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn identified_by(mut self, field: impl Into<String>) -> Self {
        self.identified_by = Some(field.into());
        self
    }

    pub fn abstract_concept(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn to_cto(&self) -> String {
        let abstract_kw = if self.is_abstract { "abstract " } else { "" };
        let identified = self
            .identified_by
            .as_ref()
            .map(|f| format!(" identified by {}", f))
            .unwrap_or_default();
        let extends = self.extends.as_ref().map(|p| format!(" extends {}", p)).unwrap_or_default();

        let mut lines = vec![format!("{}concept {}{}{} {{", abstract_kw, self.name, identified, extends)];
        lines.extend(self.fields.iter().map(FieldDefinition::to_cto_line));
        lines.push("}".to_string());
        lines.join("\n")
    }
}

/// Everything needed to render one model file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredIntent {
    pub namespace: String,

    #[serde(default = "default_version")]
    pub version: String,

    pub concepts: Vec<ConceptDefinition>,

    #[serde(default)]
    pub imports: Vec<String>,
}

impl StructuredIntent {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: default_version(),
            concepts: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn with_concept(mut self, concept: ConceptDefinition) -> Self {
        self.concepts.push(concept);
        self
    }

    pub fn with_import(mut self, import: impl Into<String>) -> Self {
        self.imports.push(import.into());
        self
    }

    /// Check naming and shape rules
    pub fn validate(&self) -> Result<()> {
        if !NAMESPACE_RE.is_match(&self.namespace) {
            return Err(AccordoError::InvalidIntent(format!(
                "namespace '{}' must be lowercase dotted segments",
                self.namespace
            )));
        }
        if !VERSION_RE.is_match(&self.version) {
            return Err(AccordoError::InvalidIntent(format!(
                "version '{}' must look like 1.0.0",
                self.version
            )));
        }
        if self.concepts.is_empty() {
            return Err(AccordoError::InvalidIntent("at least one concept is required".to_string()));
        }

        for concept in &self.concepts {
            if !PASCAL_RE.is_match(&concept.name) {
                return Err(AccordoError::InvalidIntent(format!(
                    "concept name '{}' must be PascalCase",
                    concept.name
                )));
            }
            if let Some(field) = concept.fields.iter().find(|f| !CAMEL_RE.is_match(&f.name)) {
                return Err(AccordoError::InvalidIntent(format!(
                    "field name '{}' in concept '{}' must be camelCase",
                    field.name, concept.name
                )));
            }
        }

        Ok(())
    }

    /// Render the whole intent as Concerto source
    pub fn to_cto(&self) -> String {
        let mut lines = vec![format!("namespace {}@{}", self.namespace, self.version), String::new()];

        for import in &self.imports {
            lines.push(format!("import {}", import));
        }
        if !self.imports.is_empty() {
            lines.push(String::new());
        }

        for concept in &self.concepts {
            lines.push(concept.to_cto());
            lines.push(String::new());
        }

        format!("{}\n", lines.join("\n").trim())
    }

    /// Output file name: namespace with dots replaced by underscores
    pub fn file_name(&self) -> String {
        format!("{}.cto", self.namespace.replace('.', "_"))
    }

    pub fn field_count(&self) -> usize {
        self.concepts.iter().map(|c| c.fields.len()).sum()
    }

    /// Field types that are neither primitives, concepts declared here, nor named by an import
    pub fn undeclared_types(&self) -> Vec<&str> {
        let mut undeclared: Vec<&str> = self
            .concepts
            .iter()
            .flat_map(|c| c.fields.iter())
            .map(|f| f.type_name.as_str())
            .filter(|ty| !PRIMITIVE_TYPES.contains(ty))
            .filter(|ty| !self.concepts.iter().any(|c| c.name == *ty))
            .filter(|ty| {
                !self
                    .imports
                    .iter()
                    .any(|import| import.split(|c: char| !c.is_alphanumeric()).any(|part| part == *ty))
            })
            .collect();
        undeclared.sort_unstable();
        undeclared.dedup();
        undeclared
    }
}
