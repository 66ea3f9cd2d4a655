// Tool schemas
//
// Converts tool definitions into provider-facing function descriptors and
// decodes raw argument payloads against the declared parameter schema.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::ToolFailure;
use crate::state::StateShape;
use crate::tool::ToolDefinition;

/// Names accepted by OpenAI-compatible function calling
const TOOL_NAME_PATTERN: &str = r"^[A-Za-z0-9_-]{1,64}$";

static TOOL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TOOL_NAME_PATTERN).expect("tool name pattern is valid"));

/// Provider-facing description of one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (used by LLM and for registry lookup)
    pub name: String,
    /// Tool description for LLM
    pub description: String,
    /// JSON schema for tool parameters
    pub parameters: Value,
}

/// Produces the provider-facing descriptor for a tool.
///
/// Returning `Err` marks the tool as unusable; the registry turns the message
/// into an `InvalidTool` error naming the tool.
pub trait SchemaFormatter: Send + Sync {
    fn describe(&self, tool: &ToolDefinition) -> Result<ToolSchema, String>;
}

/// Function-calling descriptors in the OpenAI format
#[derive(Debug, Default, Clone, Copy)]
pub struct FunctionSchemaFormatter;

impl SchemaFormatter for FunctionSchemaFormatter {
    fn describe(&self, tool: &ToolDefinition) -> Result<ToolSchema, String> {
        if !TOOL_NAME_RE.is_match(tool.name()) {
            return Err(format!(
                "name must match {} to be callable by the model",
                TOOL_NAME_PATTERN
            ));
        }

        let parameters = tool.parameters();
        let Some(object) = parameters.as_object() else {
            return Err(format!(
                "parameters schema must be a JSON object, got {}",
                StateShape::of(parameters)
            ));
        };

        match object.get("type").and_then(Value::as_str) {
            Some("object") => {}
            Some(other) => {
                return Err(format!(
                    "parameters schema must describe an object, not '{}'",
                    other
                ))
            }
            None => return Err("parameters schema is missing \"type\": \"object\"".to_string()),
        }

        if let Some(required) = object.get("required") {
            let all_strings = required
                .as_array()
                .is_some_and(|fields| fields.iter().all(Value::is_string));
            if !all_strings {
                return Err("\"required\" must be an array of field names".to_string());
            }
        }

        Ok(ToolSchema {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: parameters.clone(),
        })
    }
}

/// Parse a raw payload into a JSON object without consulting any schema.
///
/// An empty payload counts as `{}`. Anything other than a JSON object is a
/// decode failure.
pub fn parse_arguments(raw: &str) -> Result<Value, ToolFailure> {
    let arguments: Value = if raw.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(raw).map_err(|e| ToolFailure::Decode(e.to_string()))?
    };

    if !arguments.is_object() {
        return Err(ToolFailure::Decode(format!(
            "expected a JSON object, got {}",
            StateShape::of(&arguments)
        )));
    }

    Ok(arguments)
}

/// Check that every field the schema lists as `required` is present.
pub fn check_required(arguments: &Value, schema: &Value) -> Result<(), ToolFailure> {
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|fields| fields.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    let missing = required
        .into_iter()
        .find(|field| arguments.get(*field).is_none());

    match missing {
        Some(field) => Err(ToolFailure::Decode(format!(
            "missing required field '{}'",
            field
        ))),
        None => Ok(()),
    }
}
