//! Accordo - natural-language contracts to validated Concerto models
//!
//! A description is turned into structured intent by an LLM, rendered to
//! `.cto` source, and checked against the `concerto` CLI. Rejected models go
//! through a bounded repair loop driven by the validator's classified output.

pub mod analyst;
pub mod error;
pub mod generator;
pub mod intent;
pub mod llm;
pub mod prompt;
pub mod session;
pub mod validation;
pub mod workflow;

pub use error::{AccordoError, Result};
