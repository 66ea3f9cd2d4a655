// Integration tests for the agent loop
//
// These tests drive Agent::run end to end against the scripted
// MockLlmProvider and check state, termination and transcript shape.

use serde_json::{json, Value};
use tooloop_core::{
    memory::{MockLlmProvider, MockLlmResponse},
    Agent, AgentConfig, AgentLoopError, Capability, FunctionSchemaFormatter, LoopPhase,
    MessageRole, PlainReplyPolicy, RunRequest, RunStatus, SchemaFormatter, ToolChoice,
    ToolDefinition, ToolExecutionResult, ToolHandler, ToolInvocation, ToolSchema,
};

const MODEL: &str = "mock-model";

// =============================================================================
// Test tools
// =============================================================================

fn set_value() -> ToolDefinition {
    ToolDefinition::builder("SetValue")
        .description("Replace the state with the given value")
        .parameters(json!({
            "type": "object",
            "properties": {"value": {"type": "integer"}},
            "required": ["value"]
        }))
        .capability(Capability::Stateful)
        .handler(ToolHandler::stateful_fn(|_state, args| {
            ToolExecutionResult::success(json!({"value": args["value"].clone()}))
        }))
        .build()
        .unwrap()
}

fn finish() -> ToolDefinition {
    ToolDefinition::builder("Finish")
        .description("Finish the task")
        .capability(Capability::StopStateful)
        .handler(ToolHandler::stateful_fn(|state, _args| ToolExecutionResult::success(state)))
        .build()
        .unwrap()
}

fn broken() -> ToolDefinition {
    ToolDefinition::builder("Broken")
        .capability(Capability::Stateful)
        .handler(ToolHandler::stateful_fn(|_state, _args| {
            ToolExecutionResult::success(json!([1, 2, 3]))
        }))
        .build()
        .unwrap()
}

fn announce() -> ToolDefinition {
    ToolDefinition::builder("Announce")
        .description("Report the final answer")
        .capability(Capability::StopStateless)
        .handler(ToolHandler::stateless_fn(|args| {
            ToolExecutionResult::success(json!({"announced": args["text"].clone()}))
        }))
        .build()
        .unwrap()
}

fn panicking() -> ToolDefinition {
    ToolDefinition::builder("Explode")
        .handler(ToolHandler::stateless_fn(|_args| panic!("kaboom")))
        .build()
        .unwrap()
}

fn call(id: &str, name: &str, arguments: Value) -> ToolInvocation {
    ToolInvocation::new(id, name, arguments.to_string())
}

fn request(prompt: &str) -> RunRequest {
    RunRequest::new(MODEL, prompt).tools([set_value(), finish(), broken(), announce()])
}

fn tool_contents(agent: &Agent<MockLlmProvider>) -> Vec<String> {
    agent
        .transcript()
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .map(|m| m.content.clone())
        .collect()
}

// =============================================================================
// Termination
// =============================================================================

#[tokio::test]
async fn test_set_value_then_finish() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "SetValue", json!({"value": 5}))]),
        MockLlmResponse::with_tools("", vec![call("call_2", "Finish", json!({}))]),
    ]);
    let mut agent = Agent::new(provider.clone(), AgentConfig::default());

    let report = agent.run_detailed(request("Set the value to 5")).await.unwrap();

    assert_eq!(report.state, json!({"value": 5}));
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.dispatches, 2);
    assert_eq!(report.provider_calls, 2);
    assert_eq!(agent.phase(), LoopPhase::Stopped);
    assert_eq!(agent.state(), &json!({"value": 5}));

    // user, assistant, tool, assistant, tool
    let roles: Vec<MessageRole> = agent.transcript().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
            MessageRole::Tool,
        ]
    );
    assert!(agent.transcript().unanswered_invocations().is_empty());
    assert_eq!(provider.call_count().await, 2);
}

#[tokio::test]
async fn test_budget_allows_one_less_provider_call() {
    let provider = MockLlmProvider::new();
    let config = AgentConfig::default().with_initial_state(json!({"value": 0}));
    let mut agent = Agent::new(provider.clone(), config);

    let report = agent
        .run_detailed(request("Never finishes").budget(4))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::BudgetExhausted);
    assert_eq!(report.provider_calls, 3);
    assert_eq!(report.state, json!({"value": 0}));
    assert_eq!(provider.call_count().await, 3);
    assert_eq!(agent.phase(), LoopPhase::BudgetExhausted);
}

#[tokio::test]
async fn test_budget_of_one_makes_no_provider_call() {
    let provider = MockLlmProvider::new();
    let mut agent = Agent::new(provider.clone(), AgentConfig::default());

    let state = agent.run(request("Anything").budget(1)).await.unwrap();

    assert_eq!(state, json!({}));
    assert_eq!(provider.call_count().await, 0);
    // Only the user prompt was recorded
    assert_eq!(agent.transcript().len(), 1);
}

#[tokio::test]
async fn test_budget_counts_tool_turns() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "SetValue", json!({"value": 1}))]),
        MockLlmResponse::with_tools("", vec![call("call_2", "SetValue", json!({"value": 2}))]),
        MockLlmResponse::with_tools("", vec![call("call_3", "Finish", json!({}))]),
    ]);
    let mut agent = Agent::new(provider.clone(), AgentConfig::default());

    let report = agent.run_detailed(request("Count").budget(3)).await.unwrap();

    assert_eq!(report.status, RunStatus::BudgetExhausted);
    assert_eq!(report.state, json!({"value": 2}));
    assert_eq!(provider.call_count().await, 2);
}

#[tokio::test]
async fn test_plain_reply_continues_by_default() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::text("Let me think about it"),
        MockLlmResponse::with_tools("", vec![call("call_1", "Finish", json!({}))]),
    ]);
    let mut agent = Agent::new(provider.clone(), AgentConfig::default());

    let report = agent.run_detailed(request("Think")).await.unwrap();

    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.provider_calls, 2);
    assert_eq!(report.final_response.as_deref(), Some("Let me think about it"));

    let calls = provider.calls().await;
    let second = &calls[1].messages;
    assert_eq!(second.last().unwrap().role, MessageRole::Assistant);
    assert_eq!(second.last().unwrap().content, "Let me think about it");
}

#[tokio::test]
async fn test_plain_reply_stop_policy() {
    let provider = MockLlmProvider::with_responses(vec![MockLlmResponse::text("The answer is 4")]);
    let config = AgentConfig::default().with_plain_reply(PlainReplyPolicy::Stop);
    let mut agent = Agent::new(provider.clone(), config);

    let report = agent.run_detailed(request("What is 2+2?")).await.unwrap();

    assert_eq!(report.status, RunStatus::Replied);
    assert_eq!(report.final_response.as_deref(), Some("The answer is 4"));
    assert_eq!(report.dispatches, 0);
    assert_eq!(provider.call_count().await, 1);
}

#[tokio::test]
async fn test_stateless_stop_keeps_state_and_exposes_output() {
    let provider = MockLlmProvider::with_responses(vec![MockLlmResponse::with_tools(
        "",
        vec![call("call_1", "Announce", json!({"text": "done"}))],
    )]);
    let config = AgentConfig::default().with_initial_state(json!({"value": 7}));
    let mut agent = Agent::new(provider, config);

    let report = agent.run_detailed(request("Announce it")).await.unwrap();

    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.state, json!({"value": 7}));
    assert_eq!(report.stop_output, Some(json!({"announced": "done"})));
}

// =============================================================================
// Failures reported to the model
// =============================================================================

#[tokio::test]
async fn test_unknown_tool_continues() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "Nope", json!({}))]),
        MockLlmResponse::with_tools("", vec![call("call_2", "Finish", json!({}))]),
    ]);
    let mut agent = Agent::new(provider.clone(), AgentConfig::default());

    let report = agent.run_detailed(request("Try a missing tool")).await.unwrap();

    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.dispatches, 2);
    assert_eq!(
        tool_contents(&agent)[0],
        json!({"error": "Unknown tool: Nope"}).to_string()
    );

    // The model saw the failure on its next turn
    let calls = provider.calls().await;
    let seen = calls[1].messages.last().unwrap();
    assert_eq!(seen.role, MessageRole::Tool);
    assert_eq!(seen.tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn test_malformed_arguments_continue() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::tool_call("call_1", "SetValue", "{not json"),
        MockLlmResponse::with_tools("", vec![call("call_2", "SetValue", json!({"value": 3}))]),
        MockLlmResponse::with_tools("", vec![call("call_3", "Finish", json!({}))]),
    ]);
    let mut agent = Agent::new(provider, AgentConfig::default());

    let state = agent.run(request("Retry after a typo")).await.unwrap();

    assert_eq!(state, json!({"value": 3}));
    assert!(tool_contents(&agent)[0].contains("Invalid tool arguments"));
}

#[tokio::test]
async fn test_missing_required_field_is_reported() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "SetValue", json!({}))]),
        MockLlmResponse::with_tools("", vec![call("call_2", "Finish", json!({}))]),
    ]);
    let config = AgentConfig::default().with_initial_state(json!({"value": 1}));
    let mut agent = Agent::new(provider, config);

    let state = agent.run(request("Forget the argument")).await.unwrap();

    assert_eq!(state, json!({"value": 1}));
    let content = &tool_contents(&agent)[0];
    assert!(content.contains("Invalid tool arguments"));
    assert!(content.contains("value"));
}

#[tokio::test]
async fn test_shape_violation_keeps_previous_state() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "Broken", json!({}))]),
        MockLlmResponse::with_tools("", vec![call("call_2", "Finish", json!({}))]),
    ]);
    let config = AgentConfig::default().with_initial_state(json!({"value": 1}));
    let mut agent = Agent::new(provider, config);

    let report = agent.run_detailed(request("Break the state")).await.unwrap();

    assert_eq!(report.state, json!({"value": 1}));
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(
        tool_contents(&agent)[0],
        json!({"error": "State shape violation: expected object, got array"}).to_string()
    );
}

#[tokio::test]
async fn test_stop_tool_with_shape_violation_still_stops() {
    let finish_with_number = ToolDefinition::builder("FinishWithNumber")
        .capability(Capability::StopStateful)
        .handler(ToolHandler::stateful_fn(|_state, _args| {
            ToolExecutionResult::success(json!(42))
        }))
        .build()
        .unwrap();
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "FinishWithNumber", json!({}))]),
        MockLlmResponse::with_tools("", vec![call("call_2", "SetValue", json!({"value": 9}))]),
    ]);
    let config = AgentConfig::default().with_initial_state(json!({"v": 1}));
    let mut agent = Agent::new(provider.clone(), config);

    let report = agent
        .run_detailed(request("Finish badly").budget(5).tool(finish_with_number))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.state, json!({"v": 1}));
    assert_eq!(report.provider_calls, 1);
    assert_eq!(provider.call_count().await, 1);
    assert_eq!(agent.phase(), LoopPhase::Stopped);
    assert_eq!(
        tool_contents(&agent),
        vec![json!({"error": "State shape violation: expected object, got number"}).to_string()]
    );
}

#[tokio::test]
async fn test_panicking_tool_does_not_abort_run() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "Explode", json!({}))]),
        MockLlmResponse::with_tools("", vec![call("call_2", "Finish", json!({}))]),
    ]);
    let mut agent = Agent::new(provider, AgentConfig::default());

    let report = agent
        .run_detailed(request("Explode").tool(panicking()))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Stopped);
    let content = &tool_contents(&agent)[0];
    assert!(content.contains("Error executing Explode"));
    assert!(content.contains("kaboom"));
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_parallel_disabled_runs_first_invocation_only() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools(
            "",
            vec![
                call("call_1", "SetValue", json!({"value": 1})),
                call("call_2", "SetValue", json!({"value": 2})),
            ],
        ),
        MockLlmResponse::with_tools("", vec![call("call_3", "Finish", json!({}))]),
    ]);
    let mut agent = Agent::new(provider, AgentConfig::default());

    let report = agent.run_detailed(request("Two at once")).await.unwrap();

    assert_eq!(report.state, json!({"value": 1}));
    assert_eq!(report.dispatches, 2);

    let assistant = &agent.transcript().messages()[1];
    assert_eq!(assistant.tool_calls.len(), 1);
    assert_eq!(assistant.tool_calls[0].id, "call_1");
    assert!(agent.transcript().unanswered_invocations().is_empty());
}

#[tokio::test]
async fn test_parallel_enabled_runs_batch_in_order() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools(
            "",
            vec![
                call("call_1", "SetValue", json!({"value": 1})),
                call("call_2", "SetValue", json!({"value": 2})),
                call("call_3", "Finish", json!({})),
            ],
        ),
    ]);
    let mut agent = Agent::new(provider.clone(), AgentConfig::default());

    let report = agent
        .run_detailed(request("Three at once").parallel_tool_calls(true))
        .await
        .unwrap();

    assert_eq!(report.state, json!({"value": 2}));
    assert_eq!(report.dispatches, 3);
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(provider.call_count().await, 1);
}

#[tokio::test]
async fn test_stop_short_circuits_rest_of_batch() {
    let provider = MockLlmProvider::with_responses(vec![MockLlmResponse::with_tools(
        "",
        vec![
            call("call_1", "Finish", json!({})),
            call("call_2", "SetValue", json!({"value": 9})),
        ],
    )]);
    let config = AgentConfig::default().with_initial_state(json!({"value": 4}));
    let mut agent = Agent::new(provider, config);

    let report = agent
        .run_detailed(request("Stop early").parallel_tool_calls(true))
        .await
        .unwrap();

    assert_eq!(report.state, json!({"value": 4}));
    assert_eq!(report.dispatches, 1);

    let contents = tool_contents(&agent);
    assert_eq!(contents.len(), 2);
    assert!(contents[1].contains("Skipped"));
    assert!(agent.transcript().unanswered_invocations().is_empty());
}

// =============================================================================
// Fatal errors
// =============================================================================

#[tokio::test]
async fn test_registration_errors_make_no_provider_call() {
    let provider = MockLlmProvider::new();
    let mut agent = Agent::new(provider.clone(), AgentConfig::default());

    let duplicate = RunRequest::new(MODEL, "dup").tools([set_value(), set_value()]);
    assert!(matches!(
        agent.run(duplicate).await,
        Err(AgentLoopError::Configuration(_))
    ));

    let bad_name = ToolDefinition::builder("not a valid name!")
        .handler(ToolHandler::stateless_fn(|_| ToolExecutionResult::success(json!(null))))
        .build()
        .unwrap();
    assert!(matches!(
        agent.run(RunRequest::new(MODEL, "bad").tool(bad_name)).await,
        Err(AgentLoopError::InvalidTool { .. })
    ));

    let pinned_missing = request("pin").tool_choice(ToolChoice::tool("Missing"));
    assert!(matches!(
        agent.run(pinned_missing).await,
        Err(AgentLoopError::Configuration(_))
    ));

    assert_eq!(provider.call_count().await, 0);
    assert!(agent.transcript().is_empty());
}

#[test]
fn test_contract_violation_at_build_time() {
    let result = ToolDefinition::builder("Finish")
        .capability(Capability::StopStateful)
        .handler(ToolHandler::stateless_fn(|_| ToolExecutionResult::success(json!(null))))
        .build();

    assert!(matches!(
        result,
        Err(AgentLoopError::ContractViolation { .. })
    ));
}

#[tokio::test]
async fn test_provider_error_propagates() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "SetValue", json!({"value": 8}))]),
        MockLlmResponse::error("connection reset"),
    ]);
    let mut agent = Agent::new(provider, AgentConfig::default());

    let err = agent.run(request("Fail midway")).await.unwrap_err();

    assert!(matches!(err, AgentLoopError::Provider(_)));
    // Progress made before the failure stays on the agent
    assert_eq!(agent.state(), &json!({"value": 8}));
    assert_eq!(agent.phase(), LoopPhase::Running);
}

// =============================================================================
// Requests sent to the provider
// =============================================================================

#[tokio::test]
async fn test_request_carries_schemas_and_policy() {
    let provider = MockLlmProvider::with_responses(vec![MockLlmResponse::with_tools(
        "",
        vec![call("call_1", "Finish", json!({}))],
    )]);
    let config = AgentConfig::default().with_system_prompt("You set values.");
    let mut agent = Agent::new(provider.clone(), config);

    agent
        .run(request("Go").tool_choice(ToolChoice::Required))
        .await
        .unwrap();

    let calls = provider.calls().await;
    let sent = &calls[0];
    assert_eq!(sent.model, MODEL);
    assert_eq!(sent.tool_choice, ToolChoice::Required);
    assert!(!sent.parallel_tool_calls);

    let names: Vec<&str> = sent.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["SetValue", "Finish", "Broken", "Announce"]);
    assert_eq!(sent.tools[0].parameters["required"], json!(["value"]));

    assert_eq!(sent.messages[0].role, MessageRole::System);
    assert_eq!(sent.messages[0].content, "You set values.");
    assert_eq!(sent.messages[1].content, "Go");
}

#[tokio::test]
async fn test_tool_choice_forced_to_auto_without_tools() {
    let provider = MockLlmProvider::with_responses(vec![MockLlmResponse::text("hi")]);
    let config = AgentConfig::default().with_plain_reply(PlainReplyPolicy::Stop);
    let mut agent = Agent::new(provider.clone(), config);

    agent
        .run(RunRequest::new(MODEL, "Hello").tool_choice(ToolChoice::Required))
        .await
        .unwrap();

    let calls = provider.calls().await;
    assert_eq!(calls[0].tool_choice, ToolChoice::Auto);
    assert!(calls[0].tools.is_empty());
}

#[tokio::test]
async fn test_consecutive_runs_share_transcript_and_state() {
    let provider = MockLlmProvider::with_responses(vec![
        MockLlmResponse::with_tools("", vec![call("call_1", "SetValue", json!({"value": 1}))]),
        MockLlmResponse::with_tools("", vec![call("call_2", "Finish", json!({}))]),
        MockLlmResponse::with_tools("", vec![call("call_3", "Finish", json!({}))]),
    ]);
    let mut agent = Agent::new(provider.clone(), AgentConfig::default());

    let first = agent.run(request("First")).await.unwrap();
    assert_eq!(first, json!({"value": 1}));

    let second = agent.run(request("Second")).await.unwrap();
    assert_eq!(second, json!({"value": 1}));

    let calls = provider.calls().await;
    assert_eq!(calls[2].messages[0].content, "First");
    assert_eq!(calls[2].messages.last().unwrap().content, "Second");

    agent.clear_history();
    assert!(agent.transcript().is_empty());
}

struct UppercaseDescriptions;

impl SchemaFormatter for UppercaseDescriptions {
    fn describe(&self, tool: &ToolDefinition) -> Result<ToolSchema, String> {
        let schema = FunctionSchemaFormatter.describe(tool)?;
        Ok(ToolSchema {
            description: schema.description.to_uppercase(),
            ..schema
        })
    }
}

#[tokio::test]
async fn test_custom_schema_formatter() {
    let provider = MockLlmProvider::with_responses(vec![MockLlmResponse::with_tools(
        "",
        vec![call("call_1", "Finish", json!({}))],
    )]);
    let mut agent = Agent::new(provider.clone(), AgentConfig::default())
        .with_schema_formatter(UppercaseDescriptions);

    agent.run(request("Shout")).await.unwrap();

    let calls = provider.calls().await;
    assert_eq!(calls[0].tools[1].description, "FINISH THE TASK");
}
