// Error types for the agent loop
//
// Two families:
// - AgentLoopError: fatal, returned to the caller (contract, registration,
//   configuration and provider failures)
// - ToolFailure: recovered, rendered into a tool-result turn so the model
//   can correct itself on the next turn

use thiserror::Error;

/// Result type alias for agent loop operations
pub type Result<T> = std::result::Result<T, AgentLoopError>;

/// Errors that abort a run (or prevent it from starting)
#[derive(Debug, Error)]
pub enum AgentLoopError {
    /// A tool definition does not satisfy its capability contract
    #[error("Tool '{tool}' violates its contract: {reason}")]
    ContractViolation { tool: String, reason: String },

    /// A tool cannot be described to the provider
    #[error("Invalid tool '{tool}': {reason}")]
    InvalidTool { tool: String, reason: String },

    /// Run configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AgentLoopError {
    /// Create a contract violation error
    pub fn contract(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentLoopError::ContractViolation {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid tool error
    pub fn invalid_tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentLoopError::InvalidTool {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        AgentLoopError::Configuration(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        AgentLoopError::Provider(msg.into())
    }
}

/// Failures caused by the model's own output or by a tool at call time.
///
/// These never leave the dispatch engine: each one becomes the error payload
/// of exactly one tool-result turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolFailure {
    /// The argument payload could not be decoded
    #[error("Invalid tool arguments: {0}")]
    Decode(String),

    /// The invocation names a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A stateful tool returned a value of the wrong shape
    #[error("State shape violation: expected {expected}, got {actual}")]
    StateShape { expected: String, actual: String },

    /// The tool reported an error or panicked
    #[error("Error executing {tool}: {message}")]
    Execution { tool: String, message: String },
}

impl ToolFailure {
    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolFailure::Execution {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
