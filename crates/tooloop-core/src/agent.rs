// Agent Loop
//
// The Agent owns the transcript and the state value, asks the provider for
// the next decision, and drives the dispatch engine until a stop tool runs or
// the step budget is spent.
//
// Key design decisions:
// - Invocations in a batch run strictly in provider order, one at a time
// - Without parallel tool calls only the first invocation is honored, and the
//   assistant turn is rewritten so the transcript matches what ran
// - A plain reply is not terminal unless PlainReplyPolicy::Stop is configured
// - Budget exhaustion returns the current state; it is not an error

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, PlainReplyPolicy, RunRequest};
use crate::dispatch::{dispatch, DispatchStatus};
use crate::error::{AgentLoopError, Result};
use crate::message::{Message, ToolResult, Transcript};
use crate::provider::{CompletionRequest, LlmProvider, ToolChoice};
use crate::registry::ToolRegistry;
use crate::schema::{FunctionSchemaFormatter, SchemaFormatter};
use crate::state::AgentState;

/// Result text for invocations that follow a stop tool in the same batch
const SKIPPED_AFTER_STOP: &str = "Skipped: the agent stopped before this tool call ran";

macro_rules! trace_step {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Running,
    AwaitingProvider,
    Dispatching,
    Stopped,
    BudgetExhausted,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A stop tool ran
    Stopped,
    /// The step budget was spent first
    BudgetExhausted,
    /// The model replied without tools and the policy is `PlainReplyPolicy::Stop`
    Replied,
}

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Agent state at termination
    pub state: AgentState,
    pub status: RunStatus,
    /// Provider round-trips made
    pub provider_calls: usize,
    /// Dispatch cycles executed (skipped invocations excluded)
    pub dispatches: usize,
    /// Value returned by the stop tool, if one ran
    pub stop_output: Option<Value>,
    /// Last non-empty assistant text
    pub final_response: Option<String>,
}

/// The agent loop
///
/// One `Agent` serves one conversation at a time; `run` takes `&mut self`.
/// Independent agents can run concurrently.
pub struct Agent<P: LlmProvider> {
    provider: P,
    config: AgentConfig,
    formatter: Arc<dyn SchemaFormatter>,
    transcript: Transcript,
    state: AgentState,
    phase: LoopPhase,
}

impl<P: LlmProvider> Agent<P> {
    /// Create a new agent
    ///
    /// The system prompt, if any, becomes the first transcript turn.
    pub fn new(provider: P, config: AgentConfig) -> Self {
        let mut transcript = Transcript::new();
        if let Some(prompt) = &config.system_prompt {
            transcript.push(Message::system(prompt));
        }

        Self {
            provider,
            state: config.initial_state.clone(),
            config,
            formatter: Arc::new(FunctionSchemaFormatter),
            transcript,
            phase: LoopPhase::Running,
        }
    }

    /// Describe tools to the provider with a custom formatter
    pub fn with_schema_formatter(mut self, formatter: impl SchemaFormatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Re-seed the state, e.g. with the result of a previous run
    pub fn set_state(&mut self, state: AgentState) {
        self.state = state;
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Drop the conversation history, keeping the system prompt
    pub fn clear_history(&mut self) {
        self.transcript = Transcript::new();
        if let Some(prompt) = &self.config.system_prompt {
            self.transcript.push(Message::system(prompt));
        }
    }

    /// Run the agent and return the final state
    pub async fn run(&mut self, request: RunRequest) -> Result<AgentState> {
        Ok(self.run_detailed(request).await?.state)
    }

    /// Run the agent and return the full report
    pub async fn run_detailed(&mut self, request: RunRequest) -> Result<RunReport> {
        request.validate()?;

        let RunRequest {
            model,
            prompt,
            budget,
            tools,
            tool_choice,
            parallel_tool_calls,
        } = request;

        let registry = ToolRegistry::register_with(tools, self.formatter.as_ref())?;
        let tool_choice = resolve_tool_choice(&registry, tool_choice)?;

        info!(
            model = %model,
            budget = budget,
            tools = registry.len(),
            tool_choice = %tool_choice,
            "Starting agent run"
        );

        self.transcript.push(Message::user(prompt));
        self.phase = LoopPhase::Running;

        let mut step = 0;
        let mut report = RunReport {
            state: Value::Null,
            status: RunStatus::BudgetExhausted,
            provider_calls: 0,
            dispatches: 0,
            stop_output: None,
            final_response: None,
        };

        loop {
            step += 1;

            if step >= budget {
                warn!(
                    budget = budget,
                    "The agent has reached the maximum budget of steps without completion"
                );
                self.phase = LoopPhase::BudgetExhausted;
                return Ok(self.finish(report, RunStatus::BudgetExhausted));
            }

            trace_step!(self.config.verbose, iteration = step, budget = budget, "Agent step");

            self.phase = LoopPhase::AwaitingProvider;
            let completion_request = CompletionRequest {
                model: model.clone(),
                messages: self.transcript.messages().to_vec(),
                tools: registry.schemas(),
                tool_choice: tool_choice.clone(),
                parallel_tool_calls,
            };

            let completion = match self.provider.complete(&completion_request).await {
                Ok(completion) => completion,
                Err(e) => {
                    error!(iteration = step, error = %e, "Error while running agent");
                    self.phase = LoopPhase::Running;
                    return Err(e);
                }
            };
            report.provider_calls += 1;

            if !completion.text.is_empty() {
                report.final_response = Some(completion.text.clone());
            }

            let mut tool_calls = completion.tool_calls;

            if tool_calls.is_empty() {
                trace_step!(self.config.verbose, iteration = step, "Agent: {}", completion.text);
                self.transcript.push(Message::assistant(completion.text));

                match self.config.plain_reply {
                    PlainReplyPolicy::Continue => {
                        self.phase = LoopPhase::Running;
                        continue;
                    }
                    PlainReplyPolicy::Stop => {
                        self.phase = LoopPhase::Stopped;
                        return Ok(self.finish(report, RunStatus::Replied));
                    }
                }
            }

            if !parallel_tool_calls && tool_calls.len() > 1 {
                let discarded: Vec<String> =
                    tool_calls.drain(1..).map(|call| call.name).collect();
                warn!(
                    iteration = step,
                    kept = %tool_calls[0].name,
                    discarded = ?discarded,
                    "Parallel tool calls are disabled; only the first tool call will run"
                );
            }

            self.transcript.push(Message::assistant_with_tools(
                completion.text,
                tool_calls.clone(),
            ));

            self.phase = LoopPhase::Dispatching;
            let mut stopped = false;

            for invocation in &tool_calls {
                if stopped {
                    self.transcript.push(Message::tool_result(&ToolResult::failure(
                        &invocation.id,
                        SKIPPED_AFTER_STOP,
                    )));
                    continue;
                }

                trace_step!(
                    self.config.verbose,
                    tool_name = %invocation.name,
                    tool_call_id = %invocation.id,
                    "Tool Call: {}({})",
                    invocation.name,
                    invocation.arguments
                );

                let state = std::mem::take(&mut self.state);
                let outcome = dispatch(&registry, invocation, state, &mut self.transcript).await;
                self.state = outcome.state;
                report.dispatches += 1;

                match &outcome.failure {
                    Some(failure) => warn!(
                        tool_name = %invocation.name,
                        tool_call_id = %invocation.id,
                        error = %failure,
                        "Tool call failed"
                    ),
                    None => trace_step!(
                        self.config.verbose,
                        tool_name = %invocation.name,
                        "Tool Call Result: {}(...) -> {}",
                        invocation.name,
                        outcome.result.to_content()
                    ),
                }

                if outcome.status == DispatchStatus::Stop {
                    stopped = true;
                    report.stop_output = outcome.result.result;
                }
            }

            if stopped {
                trace_step!(self.config.verbose, iteration = step, "Agent execution complete");
                self.phase = LoopPhase::Stopped;
                return Ok(self.finish(report, RunStatus::Stopped));
            }

            self.phase = LoopPhase::Running;
        }
    }

    fn finish(&self, mut report: RunReport, status: RunStatus) -> RunReport {
        info!(
            status = ?status,
            provider_calls = report.provider_calls,
            dispatches = report.dispatches,
            "Agent run finished"
        );
        report.status = status;
        report.state = self.state.clone();
        report
    }
}

impl<P: LlmProvider> std::fmt::Debug for Agent<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("phase", &self.phase)
            .field("messages", &self.transcript.len())
            .field("state", &self.state)
            .finish()
    }
}

/// With no tools the choice falls back to `auto`; a pinned tool must exist.
fn resolve_tool_choice(registry: &ToolRegistry, choice: ToolChoice) -> Result<ToolChoice> {
    if registry.is_empty() {
        return Ok(ToolChoice::Auto);
    }

    if let Some(name) = choice.pinned() {
        if !registry.has(name) {
            return Err(AgentLoopError::config(format!(
                "Tool choice pins '{}', which is not among the supplied tools",
                name
            )));
        }
    }

    Ok(choice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolDefinition, ToolExecutionResult, ToolHandler};
    use serde_json::json;

    fn noop(name: &str) -> ToolDefinition {
        ToolDefinition::builder(name)
            .handler(ToolHandler::stateless_fn(|_| {
                ToolExecutionResult::success(json!(null))
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_tool_choice_forced_to_auto_without_tools() {
        let registry = ToolRegistry::new();
        let choice = resolve_tool_choice(&registry, ToolChoice::Required).unwrap();
        assert_eq!(choice, ToolChoice::Auto);
    }

    #[test]
    fn test_pinned_tool_must_be_registered() {
        let registry = ToolRegistry::register(vec![noop("Add")]).unwrap();

        assert_eq!(
            resolve_tool_choice(&registry, ToolChoice::tool("Add")).unwrap(),
            ToolChoice::tool("Add")
        );
        assert!(matches!(
            resolve_tool_choice(&registry, ToolChoice::tool("Missing")),
            Err(AgentLoopError::Configuration(_))
        ));
    }
}
