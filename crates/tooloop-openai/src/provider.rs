// OpenAI Provider Implementation
//
// Implements the LlmProvider trait from tooloop-core for OpenAI's chat
// completions API (and compatible endpoints via a custom base URL).

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tooloop_core::{
    AgentLoopError, Completion, CompletionMetadata, CompletionRequest, LlmProvider,
};
use tracing::{debug, warn};

use crate::types::{tool_choice_to_openai, ChatRequest, OpenAiMessage, OpenAiResponse, OpenAiTool};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised while talking to the OpenAI API
#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Failed to send OpenAI request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OpenAI API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse OpenAI response: {0}")]
    Decode(String),

    #[error("No choices in OpenAI response")]
    NoChoices,
}

impl From<OpenAiError> for AgentLoopError {
    fn from(err: OpenAiError) -> Self {
        AgentLoopError::provider(err.to_string())
    }
}

/// OpenAI LLM provider
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    /// Requires OPENAI_API_KEY environment variable; honors OPENAI_BASE_URL
    pub fn new() -> Result<Self, OpenAiError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(OpenAiError::MissingApiKey)?;

        let provider = Self::with_api_key(api_key);
        Ok(match std::env::var("OPENAI_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => provider.with_base_url(url),
            _ => provider,
        })
    }

    /// Create a new OpenAI provider with a custom API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point the provider at an OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the wire request for one completion
    pub fn build_request(request: &CompletionRequest) -> ChatRequest {
        let has_tools = !request.tools.is_empty();

        ChatRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            stream: false,
            tools: has_tools.then(|| request.tools.iter().map(OpenAiTool::from).collect()),
            tool_choice: has_tools.then(|| tool_choice_to_openai(&request.tool_choice)),
            parallel_tool_calls: has_tools.then_some(request.parallel_tool_calls),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<Completion, OpenAiError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status = status, "OpenAI API request failed");
            return Err(OpenAiError::Api { status, body });
        }

        let body = response.text().await?;
        let parsed: OpenAiResponse =
            serde_json::from_str(&body).map_err(|e| OpenAiError::Decode(e.to_string()))?;

        let OpenAiResponse {
            model,
            choices,
            usage,
        } = parsed;

        // Extract content from the first choice
        let choice = choices.into_iter().next().ok_or(OpenAiError::NoChoices)?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| call.into_invocation())
            .collect();

        let metadata = CompletionMetadata {
            total_tokens: usage.as_ref().map(|u| u.total_tokens),
            prompt_tokens: usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: usage.as_ref().map(|u| u.completion_tokens),
            model,
            finish_reason: choice.finish_reason,
        };

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            metadata,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> tooloop_core::Result<Completion> {
        let chat_request = Self::build_request(request);

        debug!(
            model = %chat_request.model,
            messages = chat_request.messages.len(),
            tools = chat_request.tools.as_ref().map_or(0, Vec::len),
            "Sending OpenAI chat completion"
        );

        let completion = self.send(&chat_request).await?;

        debug!(
            tool_calls = completion.tool_calls.len(),
            finish_reason = ?completion.metadata.finish_reason,
            total_tokens = ?completion.metadata.total_tokens,
            "Received OpenAI chat completion"
        );

        Ok(completion)
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tooloop_core::{Message, ToolChoice, ToolSchema};

    fn completion_request(tools: Vec<ToolSchema>) -> CompletionRequest {
        CompletionRequest {
            model: "openai/gpt-4o-mini".to_string(),
            messages: vec![Message::system("Be brief"), Message::user("Add 1 and 2")],
            tools,
            tool_choice: ToolChoice::Required,
            parallel_tool_calls: false,
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = OpenAiProvider::with_api_key("sk-secret");
        let debug = format!("{:?}", provider);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = OpenAiProvider::with_api_key("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_build_request_with_tools() {
        let schema = ToolSchema {
            name: "Add".to_string(),
            description: "Add two numbers".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        };
        let wire = serde_json::to_value(OpenAiProvider::build_request(&completion_request(vec![
            schema,
        ])))
        .unwrap();

        // Routed model ids reach the endpoint as given
        assert_eq!(wire["model"], "openai/gpt-4o-mini");
        assert_eq!(wire["stream"], false);
        assert_eq!(wire["tool_choice"], "required");
        assert_eq!(wire["parallel_tool_calls"], false);
        assert_eq!(wire["tools"][0]["function"]["name"], "Add");
        assert_eq!(wire["messages"][0]["role"], "system");
    }

    #[test]
    fn test_build_request_without_tools_omits_tool_fields() {
        let wire =
            serde_json::to_value(OpenAiProvider::build_request(&completion_request(vec![])))
                .unwrap();

        assert!(wire.get("tools").is_none());
        assert!(wire.get("tool_choice").is_none());
        assert!(wire.get("parallel_tool_calls").is_none());
    }
}
