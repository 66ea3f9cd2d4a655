// OpenAI Provider
//
// This crate provides an OpenAI-compatible LLM provider implementation.
// It implements the LlmProvider trait from tooloop-core, enabling the agent
// loop to communicate with OpenAI's chat completion API.

mod provider;
mod types;

pub use provider::{OpenAiError, OpenAiProvider, DEFAULT_BASE_URL};
pub use types::{ChatRequest, OpenAiMessage, OpenAiResponse, OpenAiTool, OpenAiToolCall};

// Re-export core types for convenience
pub use tooloop_core::LlmProvider;
