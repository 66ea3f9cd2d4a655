// Tool Contract
//
// A tool is a value carrying an explicit capability tag and an executable
// handler. The tag decides whether the tool sees the agent state and whether
// the loop stops after it runs; the dispatcher matches on it exhaustively.
//
// Design decisions:
// - Handlers are trait objects (StatelessExecute / StatefulExecute) so tools
//   can be plain structs or closures
// - The capability/handler pairing is checked once, in ToolDefinitionBuilder::build
// - Error handling distinguishes between user-visible errors and internal errors
// - Internal errors are logged but not exposed to the LLM

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{AgentLoopError, Result};
use crate::state::AgentState;

// ============================================================================
// Capability
// ============================================================================

/// The four capability variants a tool can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// `execute(args)`; never sees the agent state
    #[default]
    Stateless,
    /// `execute(state, args)`; the result replaces the agent state
    Stateful,
    /// Like `Stateless`, then stops the loop
    StopStateless,
    /// Like `Stateful`, then stops the loop
    StopStateful,
}

impl Capability {
    /// Whether the tool receives the agent state
    pub fn is_stateful(self) -> bool {
        matches!(self, Capability::Stateful | Capability::StopStateful)
    }

    /// Whether the loop terminates after the tool runs
    pub fn is_stop(self) -> bool {
        matches!(self, Capability::StopStateless | Capability::StopStateful)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Stateless => write!(f, "stateless"),
            Capability::Stateful => write!(f, "stateful"),
            Capability::StopStateless => write!(f, "stop_stateless"),
            Capability::StopStateful => write!(f, "stop_stateful"),
        }
    }
}

// ============================================================================
// Tool Execution Result - Error Handling Contract
// ============================================================================

/// Result of a tool execution.
///
/// - `Success`: the value is returned to the LLM (and, for stateful tools,
///   becomes the new agent state)
/// - `ToolError`: an expected failure the LLM should see
///   (e.g., "Cannot divide by zero")
/// - `InternalError`: a system failure that is logged, while the LLM only
///   sees a generic message
#[derive(Debug)]
pub enum ToolExecutionResult {
    /// Successful execution with a JSON result
    Success(Value),

    /// Tool-level error that is safe to show to the LLM
    ToolError(String),

    /// Internal/system error that should NOT be exposed to the LLM
    InternalError(ToolInternalError),
}

impl ToolExecutionResult {
    /// Create a successful result
    pub fn success(value: impl Into<Value>) -> Self {
        ToolExecutionResult::Success(value.into())
    }

    /// Create a tool-level error (safe to show to LLM)
    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    /// Create an internal error (will be hidden from LLM)
    pub fn internal_error_msg(message: impl Into<String>) -> Self {
        ToolExecutionResult::InternalError(ToolInternalError::from_message(message))
    }
}

/// Internal error details (logged but not exposed to LLM)
#[derive(Debug)]
pub struct ToolInternalError {
    /// Error message for logging
    pub message: String,
}

impl ToolInternalError {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ToolInternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolInternalError {}

// ============================================================================
// Execution traits
// ============================================================================

/// Execute behavior of a tool that never sees the agent state.
#[async_trait]
pub trait StatelessExecute: Send + Sync {
    /// Execute the tool with decoded arguments (always a JSON object).
    async fn execute(&self, arguments: Value) -> ToolExecutionResult;
}

/// Execute behavior of a tool that receives the agent state.
///
/// The state is handed over by value. A `Success` value is adopted as the
/// complete new state; nothing is merged.
#[async_trait]
pub trait StatefulExecute: Send + Sync {
    async fn execute(&self, state: AgentState, arguments: Value) -> ToolExecutionResult;
}

struct FnStateless<F>(F);

#[async_trait]
impl<F> StatelessExecute for FnStateless<F>
where
    F: Fn(Value) -> ToolExecutionResult + Send + Sync,
{
    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        (self.0)(arguments)
    }
}

struct FnStateful<F>(F);

#[async_trait]
impl<F> StatefulExecute for FnStateful<F>
where
    F: Fn(AgentState, Value) -> ToolExecutionResult + Send + Sync,
{
    async fn execute(&self, state: AgentState, arguments: Value) -> ToolExecutionResult {
        (self.0)(state, arguments)
    }
}

/// The executable half of a tool
#[derive(Clone)]
pub enum ToolHandler {
    /// `execute(args)`
    Stateless(Arc<dyn StatelessExecute>),
    /// `execute(state, args)`
    Stateful(Arc<dyn StatefulExecute>),
}

impl ToolHandler {
    pub fn stateless(handler: impl StatelessExecute + 'static) -> Self {
        ToolHandler::Stateless(Arc::new(handler))
    }

    pub fn stateful(handler: impl StatefulExecute + 'static) -> Self {
        ToolHandler::Stateful(Arc::new(handler))
    }

    /// Wrap a synchronous closure as a stateless handler
    pub fn stateless_fn<F>(f: F) -> Self
    where
        F: Fn(Value) -> ToolExecutionResult + Send + Sync + 'static,
    {
        ToolHandler::Stateless(Arc::new(FnStateless(f)))
    }

    /// Wrap a synchronous closure as a stateful handler
    pub fn stateful_fn<F>(f: F) -> Self
    where
        F: Fn(AgentState, Value) -> ToolExecutionResult + Send + Sync + 'static,
    {
        ToolHandler::Stateful(Arc::new(FnStateful(f)))
    }

    /// Whether the handler accepts a state parameter
    pub fn takes_state(&self) -> bool {
        matches!(self, ToolHandler::Stateful(_))
    }
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolHandler::Stateless(_) => f.write_str("ToolHandler::Stateless"),
            ToolHandler::Stateful(_) => f.write_str("ToolHandler::Stateful"),
        }
    }
}

// ============================================================================
// ToolDefinition
// ============================================================================

/// A named, schema-typed operation the model may invoke.
///
/// Only obtainable through [`ToolDefinitionBuilder::build`], so every value
/// of this type has a handler that matches its capability.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    parameters: Value,
    capability: Capability,
    handler: ToolHandler,
}

impl ToolDefinition {
    /// Start declaring a tool
    pub fn builder(name: impl Into<String>) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// JSON schema of the tool's arguments
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn handler(&self) -> &ToolHandler {
        &self.handler
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("handler", &self.handler)
            .finish()
    }
}

/// Builder for [`ToolDefinition`].
///
/// # Example
///
/// ```ignore
/// let set_value = ToolDefinition::builder("SetValue")
///     .description("Store a number in the state")
///     .parameters(json!({
///         "type": "object",
///         "properties": { "n": { "type": "number" } },
///         "required": ["n"]
///     }))
///     .capability(Capability::Stateful)
///     .handler(ToolHandler::stateful_fn(|mut state, args| {
///         state["value"] = args["n"].clone();
///         ToolExecutionResult::success(state)
///     }))
///     .build()?;
/// ```
pub struct ToolDefinitionBuilder {
    name: String,
    description: String,
    parameters: Value,
    capability: Capability,
    handler: Option<ToolHandler>,
}

impl ToolDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            capability: Capability::default(),
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the JSON schema of the tool's arguments
    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    pub fn handler(mut self, handler: ToolHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Shorthand for `.handler(ToolHandler::stateless(..))`
    pub fn stateless(self, handler: impl StatelessExecute + 'static) -> Self {
        self.handler(ToolHandler::stateless(handler))
    }

    /// Shorthand for `.handler(ToolHandler::stateful(..))`
    pub fn stateful(self, handler: impl StatefulExecute + 'static) -> Self {
        self.handler(ToolHandler::stateful(handler))
    }

    /// Check the capability contract and produce the definition.
    pub fn build(self) -> Result<ToolDefinition> {
        if self.name.trim().is_empty() {
            return Err(AgentLoopError::contract(
                self.name,
                "tool name must not be empty",
            ));
        }

        let Some(handler) = self.handler else {
            return Err(AgentLoopError::contract(
                self.name,
                "tool does not implement execute",
            ));
        };

        match (self.capability.is_stateful(), handler.takes_state()) {
            (true, false) => {
                return Err(AgentLoopError::contract(
                    self.name,
                    format!(
                        "{} tool's execute does not accept a state parameter",
                        self.capability
                    ),
                ))
            }
            (false, true) => {
                return Err(AgentLoopError::contract(
                    self.name,
                    format!(
                        "{} tool's execute must not take a state parameter",
                        self.capability
                    ),
                ))
            }
            _ => {}
        }

        Ok(ToolDefinition {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            capability: self.capability,
            handler,
        })
    }
}
