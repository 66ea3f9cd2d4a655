// Dispatch Engine
//
// Resolves one tool invocation against the registry, enforces the capability
// contract, runs the tool and folds the result back into the state and the
// transcript.
//
// Every dispatch appends exactly one tool-result turn, success or failure.
// Failures caused by the model (bad arguments, unknown tool), by the tool
// (errors, panics) or by a badly shaped state are reported to the model and
// never returned to the caller.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

use crate::error::ToolFailure;
use crate::message::{Message, ToolInvocation, ToolResult, Transcript};
use crate::registry::{RegistryEntry, ToolRegistry};
use crate::schema::{check_required, parse_arguments};
use crate::state::{AgentState, StateShape};
use crate::tool::{Capability, ToolExecutionResult, ToolHandler};

/// Message shown to the LLM instead of internal error details
const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred while executing the tool";

/// Whether the loop keeps going after a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Continue,
    Stop,
}

/// Result of one dispatch cycle
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    /// Agent state after the cycle (the previous state on any failure)
    pub state: AgentState,
    /// What was recorded in the transcript
    pub result: ToolResult,
    /// Set when the cycle failed
    pub failure: Option<ToolFailure>,
}

impl DispatchOutcome {
    fn success(status: DispatchStatus, state: AgentState, result: ToolResult) -> Self {
        Self {
            status,
            state,
            result,
            failure: None,
        }
    }

    fn failed(invocation: &ToolInvocation, state: AgentState, failure: ToolFailure) -> Self {
        Self::failed_with(DispatchStatus::Continue, invocation, state, failure)
    }

    fn failed_with(
        status: DispatchStatus,
        invocation: &ToolInvocation,
        state: AgentState,
        failure: ToolFailure,
    ) -> Self {
        Self {
            status,
            state,
            result: ToolResult::failure(&invocation.id, failure.to_string()),
            failure: Some(failure),
        }
    }

    pub fn is_stop(&self) -> bool {
        self.status == DispatchStatus::Stop
    }
}

/// Run one invocation and record its tool-result turn.
pub async fn dispatch(
    registry: &ToolRegistry,
    invocation: &ToolInvocation,
    state: AgentState,
    transcript: &mut Transcript,
) -> DispatchOutcome {
    let outcome = execute_invocation(registry, invocation, state).await;
    transcript.push(Message::tool_result(&outcome.result));
    outcome
}

/// Run one invocation without touching the transcript.
pub async fn execute_invocation(
    registry: &ToolRegistry,
    invocation: &ToolInvocation,
    state: AgentState,
) -> DispatchOutcome {
    debug!(
        tool_name = %invocation.name,
        tool_call_id = %invocation.id,
        arguments = %invocation.arguments,
        "Dispatching tool call"
    );

    let arguments = match parse_arguments(&invocation.arguments) {
        Ok(arguments) => arguments,
        Err(failure) => return DispatchOutcome::failed(invocation, state, failure),
    };

    let Some(entry) = registry.get(&invocation.name) else {
        return DispatchOutcome::failed(
            invocation,
            state,
            ToolFailure::UnknownTool(invocation.name.clone()),
        );
    };

    if let Err(failure) = check_required(&arguments, entry.definition.parameters()) {
        return DispatchOutcome::failed(invocation, state, failure);
    }

    let value = match run_handler(entry, invocation, &state, arguments).await {
        Ok(value) => value,
        Err(failure) => return DispatchOutcome::failed(invocation, state, failure),
    };

    match entry.definition.capability() {
        Capability::Stateless => DispatchOutcome::success(
            DispatchStatus::Continue,
            state,
            ToolResult::success(&invocation.id, value),
        ),
        Capability::StopStateless => DispatchOutcome::success(
            DispatchStatus::Stop,
            state,
            ToolResult::success(&invocation.id, value),
        ),
        Capability::Stateful => adopt_state(invocation, state, value, DispatchStatus::Continue),
        Capability::StopStateful => adopt_state(invocation, state, value, DispatchStatus::Stop),
    }
}

/// Swap in the returned state if it keeps the current shape.
///
/// A rejected state is recorded as an error and the previous state is kept.
/// A stop tool still ends the loop.
fn adopt_state(
    invocation: &ToolInvocation,
    state: AgentState,
    returned: Value,
    status: DispatchStatus,
) -> DispatchOutcome {
    let expected = StateShape::of(&state);
    let actual = StateShape::of(&returned);

    if !expected.accepts(actual) {
        return DispatchOutcome::failed_with(
            status,
            invocation,
            state,
            ToolFailure::StateShape {
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
        );
    }

    let result = ToolResult::success(&invocation.id, returned.clone());
    DispatchOutcome::success(status, returned, result)
}

async fn run_handler(
    entry: &RegistryEntry,
    invocation: &ToolInvocation,
    state: &AgentState,
    arguments: Value,
) -> Result<Value, ToolFailure> {
    let execution = match entry.definition.handler() {
        ToolHandler::Stateless(exec) => {
            AssertUnwindSafe(exec.execute(arguments))
                .catch_unwind()
                .await
        }
        ToolHandler::Stateful(exec) => {
            AssertUnwindSafe(exec.execute(state.clone(), arguments))
                .catch_unwind()
                .await
        }
    };

    match execution {
        Ok(ToolExecutionResult::Success(value)) => Ok(value),
        Ok(ToolExecutionResult::ToolError(message)) => {
            Err(ToolFailure::execution(&invocation.name, message))
        }
        Ok(ToolExecutionResult::InternalError(err)) => {
            error!(
                tool_name = %invocation.name,
                tool_call_id = %invocation.id,
                error = %err.message,
                "Tool internal error (details hidden from LLM)"
            );
            Err(ToolFailure::execution(
                &invocation.name,
                INTERNAL_ERROR_MESSAGE,
            ))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(
                tool_name = %invocation.name,
                tool_call_id = %invocation.id,
                panic = %message,
                "Tool panicked"
            );
            Err(ToolFailure::execution(&invocation.name, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_string()
    }
}
