// Tool Registry
//
// Maps tool names to their definition plus the provider-facing schema. The
// registry is built once per run from the caller's tool list and is a pure
// function of that list.

use std::collections::HashMap;

use crate::error::{AgentLoopError, Result};
use crate::schema::{FunctionSchemaFormatter, SchemaFormatter, ToolSchema};
use crate::tool::ToolDefinition;

/// A registered tool: the executable definition and its descriptor
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub definition: ToolDefinition,
    pub schema: ToolSchema,
}

/// Tools available to one run, keyed by name.
///
/// Registration order is kept so the provider always sees the schemas in the
/// order the caller declared them.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    entries: HashMap<String, RegistryEntry>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry using the OpenAI function schema format.
    pub fn register(definitions: impl IntoIterator<Item = ToolDefinition>) -> Result<Self> {
        Self::register_with(definitions, &FunctionSchemaFormatter)
    }

    /// Build a registry with a custom schema formatter.
    ///
    /// Fails with `InvalidTool` when a descriptor cannot be produced and with
    /// `Configuration` when two definitions share a name.
    pub fn register_with(
        definitions: impl IntoIterator<Item = ToolDefinition>,
        formatter: &dyn SchemaFormatter,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.insert(definition, formatter)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, definition: ToolDefinition, formatter: &dyn SchemaFormatter) -> Result<()> {
        let schema = formatter
            .describe(&definition)
            .map_err(|reason| AgentLoopError::invalid_tool(definition.name(), reason))?;

        let name = definition.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(AgentLoopError::config(format!(
                "Duplicate tool name: {}",
                name
            )));
        }

        self.order.push(name.clone());
        self.entries.insert(name, RegistryEntry { definition, schema });
        Ok(())
    }

    /// Get a tool by exact name
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// Check if a tool is registered
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tool names in registration order
    pub fn tool_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Descriptors to send to the provider, in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|entry| entry.schema.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Capability, ToolExecutionResult, ToolHandler};
    use serde_json::json;

    fn stateless(name: &str) -> ToolDefinition {
        ToolDefinition::builder(name)
            .description(format!("{name} tool"))
            .handler(ToolHandler::stateless_fn(|_| {
                ToolExecutionResult::success(json!("ok"))
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_preserves_order() {
        let registry =
            ToolRegistry::register(vec![stateless("b"), stateless("a"), stateless("c")]).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.tool_names(), vec!["b", "a", "c"]);
        let names: Vec<_> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = ToolRegistry::register(vec![stateless("Add")]).unwrap();
        assert!(registry.has("Add"));
        assert!(!registry.has("add"));
        assert!(registry.get("Add").is_some());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ToolRegistry::register(vec![stateless("echo"), stateless("echo")]).unwrap_err();
        match err {
            AgentLoopError::Configuration(msg) => assert!(msg.contains("echo")),
            other => panic!("Expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_tool_named_in_error() {
        let bad = ToolDefinition::builder("bad tool")
            .capability(Capability::Stateless)
            .handler(ToolHandler::stateless_fn(|_| {
                ToolExecutionResult::success(json!(null))
            }))
            .build()
            .unwrap();

        let err = ToolRegistry::register(vec![stateless("ok"), bad]).unwrap_err();
        match err {
            AgentLoopError::InvalidTool { tool, .. } => assert_eq!(tool, "bad tool"),
            other => panic!("Expected invalid tool error, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_formatter() {
        struct Rejecting;
        impl SchemaFormatter for Rejecting {
            fn describe(&self, _tool: &ToolDefinition) -> std::result::Result<ToolSchema, String> {
                Err("unsupported".to_string())
            }
        }

        let err = ToolRegistry::register_with(vec![stateless("echo")], &Rejecting).unwrap_err();
        assert!(matches!(err, AgentLoopError::InvalidTool { .. }));
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::register(Vec::new()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.schemas().is_empty());
    }
}
