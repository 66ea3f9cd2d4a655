// Agent and run configuration
//
// AgentConfig is fixed for the lifetime of an Agent; RunRequest describes a
// single call to `Agent::run`. Both validate before any provider call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentLoopError, Result};
use crate::provider::ToolChoice;
use crate::state::AgentState;
use crate::tool::ToolDefinition;

/// Default step budget for a run
pub const DEFAULT_BUDGET: usize = 20;

/// What the loop does when the model answers without calling a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlainReplyPolicy {
    /// Record the reply and ask the model again (bounded by the budget)
    #[default]
    Continue,
    /// Record the reply and end the run
    Stop,
}

/// Configuration for an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System prompt that defines the agent's behavior
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// State the agent starts with
    #[serde(default = "default_state")]
    pub initial_state: AgentState,

    /// Emit per-tool trace lines at info level instead of debug
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub plain_reply: PlainReplyPolicy,
}

fn default_state() -> AgentState {
    Value::Object(Default::default())
}

impl AgentConfig {
    /// Create a new agent configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the initial state
    pub fn with_initial_state(mut self, state: AgentState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_plain_reply(mut self, policy: PlainReplyPolicy) -> Self {
        self.plain_reply = policy;
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            initial_state: default_state(),
            verbose: false,
            plain_reply: PlainReplyPolicy::default(),
        }
    }
}

/// Parameters of one `Agent::run` call
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Model identifier; the format depends on the provider
    /// (e.g., "gpt-4o-mini", "openai/gpt-4o-mini")
    pub model: String,
    /// The user's request
    pub prompt: String,
    /// Maximum number of steps; a budget of N allows N-1 provider round-trips
    pub budget: usize,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub parallel_tool_calls: bool,
}

impl RunRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            budget: DEFAULT_BUDGET,
            tools: Vec::new(),
            tool_choice: ToolChoice::default(),
            parallel_tool_calls: false,
        }
    }

    pub fn budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Add a tool
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add multiple tools
    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    /// Checks that do not need the registry
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AgentLoopError::config("Model identifier must not be empty"));
        }
        if self.prompt.trim().is_empty() {
            return Err(AgentLoopError::config("Prompt must not be empty"));
        }
        if self.budget == 0 {
            return Err(AgentLoopError::config("Budget must be a positive integer"));
        }
        if let Some(name) = self.tool_choice.pinned() {
            if name.trim().is_empty() {
                return Err(AgentLoopError::config("Pinned tool name must not be empty"));
            }
        }
        Ok(())
    }
}
