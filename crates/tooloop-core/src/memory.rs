// In-memory implementations for examples and testing
//
// MockLlmProvider plays back scripted turns in order and records every
// request it receives, so tests can assert on exactly what the loop sent.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AgentLoopError, Result};
use crate::message::ToolInvocation;
use crate::provider::{Completion, CompletionRequest, LlmProvider};

/// A mock LLM response
#[derive(Debug, Clone)]
pub struct MockLlmResponse {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    /// When set, the provider fails with this message instead of replying
    pub error: Option<String>,
}

impl MockLlmResponse {
    /// Create a text-only response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            error: None,
        }
    }

    /// Create a response with tool calls
    pub fn with_tools(text: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
            error: None,
        }
    }

    /// Create a response with a single tool call
    pub fn tool_call(id: &str, name: &str, arguments: &str) -> Self {
        Self::with_tools("", vec![ToolInvocation::new(id, name, arguments)])
    }

    /// Create a provider failure
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            tool_calls: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Mock LLM provider for testing
///
/// Returns predefined responses in sequence. Clones share the same script
/// and call log.
#[derive(Debug, Clone, Default)]
pub struct MockLlmProvider {
    responses: Arc<RwLock<Vec<MockLlmResponse>>>,
    call_index: Arc<RwLock<usize>>,
    call_log: Arc<RwLock<Vec<CompletionRequest>>>,
}

impl MockLlmProvider {
    /// Create a new mock LLM provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with a fixed script
    pub fn with_responses(responses: Vec<MockLlmResponse>) -> Self {
        Self {
            responses: Arc::new(RwLock::new(responses)),
            ..Self::default()
        }
    }

    /// Add a response to the queue
    pub async fn add_response(&self, response: MockLlmResponse) {
        self.responses.write().await.push(response);
    }

    /// Get the call log
    pub async fn calls(&self) -> Vec<CompletionRequest> {
        self.call_log.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.call_log.read().await.len()
    }

    /// Reset the provider
    pub async fn reset(&self) {
        self.responses.write().await.clear();
        *self.call_index.write().await = 0;
        self.call_log.write().await.clear();
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.call_log.write().await.push(request.clone());

        let mut index = self.call_index.write().await;
        let responses = self.responses.read().await;

        let response = responses.get(*index).cloned().unwrap_or_else(|| {
            MockLlmResponse::text("Mock response (no more responses configured)")
        });

        *index += 1;
        drop(index);
        drop(responses);

        if let Some(message) = response.error {
            return Err(AgentLoopError::provider(message));
        }

        Ok(Completion::with_tools(response.text, response.tool_calls))
    }
}
