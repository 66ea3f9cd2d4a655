// LLM Provider Types
//
// The provider is a black-box request/response collaborator: given the
// transcript, the tool schemas and the tool-choice policy, it returns the
// assistant turn and zero or more tool invocations.
//
// Errors from the provider are fatal for the run; the loop does not retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{AgentLoopError, Result};
use crate::message::{Message, ToolInvocation};
use crate::schema::ToolSchema;

// ============================================================================
// ToolChoice
// ============================================================================

/// How the model may pick tools on each turn
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides whether to call a tool
    #[default]
    Auto,
    /// The model must call at least one tool
    Required,
    /// The model must call this tool
    Tool(String),
}

impl ToolChoice {
    /// Pin the model to one tool
    pub fn tool(name: impl Into<String>) -> Self {
        ToolChoice::Tool(name.into())
    }

    /// Name of the pinned tool, if any
    pub fn pinned(&self) -> Option<&str> {
        match self {
            ToolChoice::Tool(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolChoice::Auto => write!(f, "auto"),
            ToolChoice::Required => write!(f, "required"),
            ToolChoice::Tool(name) => write!(f, "tool:{}", name),
        }
    }
}

impl FromStr for ToolChoice {
    type Err = AgentLoopError;

    /// Accepts `auto`, `required`, `tool:<name>`, or the OpenAI object form
    /// `{"type": "function", "function": {"name": "<name>"}}`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed {
            "auto" => return Ok(ToolChoice::Auto),
            "required" => return Ok(ToolChoice::Required),
            _ => {}
        }

        if let Some(name) = trimmed.strip_prefix("tool:") {
            let name = name.trim();
            if name.is_empty() {
                return Err(AgentLoopError::config("Tool choice 'tool:' needs a tool name"));
            }
            return Ok(ToolChoice::tool(name));
        }

        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed).map_err(|e| {
                AgentLoopError::config(format!("Malformed tool choice '{}': {}", trimmed, e))
            })?;
            let is_function = value.get("type").and_then(Value::as_str) == Some("function");
            let name = value
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty());
            return match (is_function, name) {
                (true, Some(name)) => Ok(ToolChoice::tool(name)),
                _ => Err(AgentLoopError::config(format!(
                    "Malformed tool choice '{}': expected {{\"type\": \"function\", \"function\": {{\"name\": ...}}}}",
                    trimmed
                ))),
            };
        }

        Err(AgentLoopError::config(format!(
            "Malformed tool choice '{}': expected auto, required, or a specific tool",
            trimmed
        )))
    }
}

// ============================================================================
// Request / Response
// ============================================================================

/// Everything the provider needs for one round-trip
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier (e.g., "gpt-4o-mini")
    pub model: String,
    /// Full transcript so far
    pub messages: Vec<Message>,
    /// Available tools
    pub tools: Vec<ToolSchema>,
    pub tool_choice: ToolChoice,
    /// Whether the model may return several invocations at once
    pub parallel_tool_calls: bool,
}

/// Metadata about LLM completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionMetadata {
    /// Total tokens used
    pub total_tokens: Option<u32>,
    /// Prompt tokens
    pub prompt_tokens: Option<u32>,
    /// Completion tokens
    pub completion_tokens: Option<u32>,
    /// Model used
    pub model: Option<String>,
    /// Finish reason
    pub finish_reason: Option<String>,
}

/// The model's decision for one turn
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Assistant text (may be empty when only tools are called)
    pub text: String,
    /// Requested invocations, in provider order
    pub tool_calls: Vec<ToolInvocation>,
    pub metadata: CompletionMetadata,
}

impl Completion {
    /// A plain text reply
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A reply carrying tool invocations
    pub fn with_tools(text: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
            ..Default::default()
        }
    }
}

// ============================================================================
// LlmProvider Trait
// ============================================================================

/// Trait for LLM providers
///
/// Implementations handle provider-specific API calls and response parsing.
/// A response without any choice must be reported as an error.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

#[async_trait]
impl<T: LlmProvider + ?Sized> LlmProvider for Box<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        (**self).complete(request).await
    }
}
