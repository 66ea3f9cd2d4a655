// OpenAI Protocol Types
//
// These types represent the OpenAI chat completions wire format and the
// conversions from the provider-agnostic core types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tooloop_core::{Message, MessageRole, ToolChoice, ToolInvocation, ToolSchema};

/// OpenAI chat completion request format
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiTool {
    pub r#type: String,
    pub function: OpenAiFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    pub id: String,
    #[serde(default = "function_type")]
    pub r#type: String,
    pub function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

// Non-streaming response types
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&Message> for OpenAiMessage {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        let tool_calls = message.has_tool_calls().then(|| {
            message
                .tool_calls
                .iter()
                .map(|tc| OpenAiToolCall {
                    id: tc.id.clone(),
                    r#type: function_type(),
                    function: OpenAiFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect()
        });

        // Assistant turns that only call tools carry no content
        let content = if tool_calls.is_some() && message.content.is_empty() {
            None
        } else {
            Some(message.content.clone())
        };

        OpenAiMessage {
            role: role.to_string(),
            content,
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

impl From<&ToolSchema> for OpenAiTool {
    fn from(schema: &ToolSchema) -> Self {
        OpenAiTool {
            r#type: function_type(),
            function: OpenAiFunction {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.parameters.clone(),
            },
        }
    }
}

impl OpenAiToolCall {
    pub fn into_invocation(self) -> ToolInvocation {
        ToolInvocation::new(self.id, self.function.name, self.function.arguments)
    }
}

/// Wire form of the tool-choice policy
pub fn tool_choice_to_openai(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool(name) => json!({
            "type": "function",
            "function": { "name": name }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_tool_turn_has_no_content() {
        let message = Message::assistant_with_tools(
            "",
            vec![ToolInvocation::new("call_1", "Add", r#"{"a":1,"b":2}"#)],
        );
        let wire = OpenAiMessage::from(&message);

        assert_eq!(wire.role, "assistant");
        assert!(wire.content.is_none());
        let calls = wire.tool_calls.unwrap();
        assert_eq!(calls[0].r#type, "function");
        assert_eq!(calls[0].function.arguments, r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_tool_result_turn_keeps_call_id() {
        let message = Message::tool_result(&tooloop_core::ToolResult::success(
            "call_1",
            json!({"result": 3}),
        ));
        let wire = serde_json::to_value(OpenAiMessage::from(&message)).unwrap();

        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
        assert!(wire.get("tool_calls").is_none());
    }

    #[test]
    fn test_tool_choice_wire_forms() {
        assert_eq!(tool_choice_to_openai(&ToolChoice::Auto), json!("auto"));
        assert_eq!(tool_choice_to_openai(&ToolChoice::Required), json!("required"));
        assert_eq!(
            tool_choice_to_openai(&ToolChoice::tool("ShowResult")),
            json!({"type": "function", "function": {"name": "ShowResult"}})
        );
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let response: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": {"name": "Finish", "arguments": "{}"}
                    }]
                }
            }]
        }))
        .unwrap();

        let call = response.choices[0].message.tool_calls.clone().unwrap().remove(0);
        let invocation = call.into_invocation();
        assert_eq!(invocation.name, "Finish");
        assert_eq!(invocation.arguments, "{}");
    }
}
