// Tool-Calling Agent Loop
//
// This crate provides a provider-agnostic agent loop: the model proposes tool
// invocations, the dispatch engine validates and executes them against an
// explicit state value, and the loop repeats until a stop tool runs or the
// step budget is spent.
//
// Key design decisions:
// - Tools declare a Capability (stateless/stateful x normal/stop); the
//   handler kind must agree with it, checked once when the tool is built
// - The LLM provider sits behind the LlmProvider trait so the loop never
//   depends on a concrete vendor
// - Tool failures become error tool-results the model can react to; only
//   configuration and provider errors abort a run
// - State is a single serde_json::Value replaced wholesale by stateful tools
// - Error handling distinguishes between user-visible and internal errors

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod state;
pub mod tool;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use agent::{Agent, LoopPhase, RunReport, RunStatus};
pub use config::{AgentConfig, PlainReplyPolicy, RunRequest, DEFAULT_BUDGET};
pub use dispatch::{dispatch, DispatchOutcome, DispatchStatus};
pub use error::{AgentLoopError, Result, ToolFailure};
pub use message::{Message, MessageRole, ToolInvocation, ToolResult, Transcript};
pub use provider::{Completion, CompletionMetadata, CompletionRequest, LlmProvider, ToolChoice};
pub use registry::ToolRegistry;
pub use schema::{FunctionSchemaFormatter, SchemaFormatter, ToolSchema};
pub use state::{AgentState, StateShape};
pub use tool::{
    Capability, StatefulExecute, StatelessExecute, ToolDefinition, ToolDefinitionBuilder,
    ToolExecutionResult, ToolHandler,
};
