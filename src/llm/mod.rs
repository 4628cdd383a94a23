//! LLM Client Layer - chat completions behind a trait
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - ChatClient for OpenAI-compatible providers (Groq by default)
//! - MockLlmClient for tests
//! - Reply cleanup helpers

pub mod chat;
pub mod client;
pub mod parse;
pub mod types;

pub use chat::{ChatClient, ChatConfig};
pub use client::{LlmClient, LlmError, MockLlmClient};
pub use parse::{extract_json, strip_code_fences};
pub use types::{CompletionRequest, CompletionResponse, FinishReason, Message, Role, Usage};
