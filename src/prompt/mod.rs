//! Prompt System - Handlebars templates for every LLM call

mod render;
mod templates;

pub use render::PromptRenderer;
pub use templates::{PromptPair, Prompts};
