// Calculator demo tools
//
// Every operation writes its outcome to `state.result`; ShowResult ends the
// run. Arithmetic errors are reported to the model and leave the state as is.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tooloop_core::{
    AgentState, Capability, StatefulExecute, ToolDefinition, ToolExecutionResult,
};

pub const SYSTEM_PROMPT: &str = "\
You are a calculator assistant.
These are the operations you can perform:
- Add: Add two numbers
- Subtract: Subtract the second number from the first
- Multiply: Multiply two numbers
- Divide: Divide the first number by the second
- Power: Raise the first number to the power of the second
- SquareRoot: Calculate the square root of a number
- ShowResult: Display the final result and finish the calculation

When you are done with all calculations, use the `ShowResult` tool to display the final result.";

pub const DEFAULT_TASK: &str = "\
Please perform the following calculations:
1. Start with 10
2. Add 5 to it
3. Multiply the result by 2
4. Subtract 7
5. Divide by 3
6. Show the final result";

/// State the calculator starts from
pub fn initial_state() -> AgentState {
    json!({ "result": null })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    SquareRoot,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Add => "Add",
            Operation::Subtract => "Subtract",
            Operation::Multiply => "Multiply",
            Operation::Divide => "Divide",
            Operation::Power => "Power",
            Operation::SquareRoot => "SquareRoot",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Operation::Add => "Add two numbers",
            Operation::Subtract => "Subtract the second number from the first",
            Operation::Multiply => "Multiply two numbers",
            Operation::Divide => "Divide the first number by the second",
            Operation::Power => "Raise the first number to the power of the second",
            Operation::SquareRoot => "Calculate the square root of a number",
        }
    }

    fn parameters(self) -> Value {
        match self {
            Operation::Power => json!({
                "type": "object",
                "properties": {
                    "base": { "type": "number", "description": "Base number" },
                    "exponent": { "type": "number", "description": "Exponent" }
                },
                "required": ["base", "exponent"]
            }),
            Operation::SquareRoot => json!({
                "type": "object",
                "properties": {
                    "number": { "type": "number", "description": "Number to find square root of" }
                },
                "required": ["number"]
            }),
            _ => json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number", "description": "First number" },
                    "b": { "type": "number", "description": "Second number" }
                },
                "required": ["a", "b"]
            }),
        }
    }

    fn apply(self, arguments: Value) -> Result<f64, String> {
        let result = match self {
            Operation::Power => {
                let args: PowerArgs = decode(arguments)?;
                args.base.powf(args.exponent)
            }
            Operation::SquareRoot => {
                let args: UnaryArgs = decode(arguments)?;
                if args.number < 0.0 {
                    return Err("Cannot calculate square root of a negative number".to_string());
                }
                args.number.sqrt()
            }
            binary => {
                let BinaryArgs { a, b } = decode(arguments)?;
                match binary {
                    Operation::Add => a + b,
                    Operation::Subtract => a - b,
                    Operation::Multiply => a * b,
                    Operation::Divide if b == 0.0 => {
                        return Err("Cannot divide by zero".to_string())
                    }
                    _ => a / b,
                }
            }
        };

        if result.is_finite() {
            Ok(result)
        } else {
            Err(format!("{} produced a non-finite result", self.name()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct BinaryArgs {
    a: f64,
    b: f64,
}

#[derive(Debug, Deserialize)]
struct PowerArgs {
    base: f64,
    exponent: f64,
}

#[derive(Debug, Deserialize)]
struct UnaryArgs {
    number: f64,
}

fn decode<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, String> {
    serde_json::from_value(arguments).map_err(|e| e.to_string())
}

/// One arithmetic tool; stores its outcome under `result`
pub struct Arithmetic(pub Operation);

#[async_trait]
impl StatefulExecute for Arithmetic {
    async fn execute(&self, state: AgentState, arguments: Value) -> ToolExecutionResult {
        match self.0.apply(arguments) {
            Ok(result) => ToolExecutionResult::success(with_result(state, result)),
            Err(message) => ToolExecutionResult::tool_error(message),
        }
    }
}

fn with_result(mut state: AgentState, result: f64) -> AgentState {
    match state.as_object_mut() {
        Some(fields) => {
            fields.insert("result".to_string(), json!(result));
            state
        }
        None => json!({ "result": result }),
    }
}

/// Show the final result and stop execution
pub struct ShowResult;

#[async_trait]
impl StatefulExecute for ShowResult {
    async fn execute(&self, state: AgentState, _arguments: Value) -> ToolExecutionResult {
        ToolExecutionResult::success(state)
    }
}

/// All calculator tools, in the order they are offered to the model
pub fn tools() -> tooloop_core::Result<Vec<ToolDefinition>> {
    let operations = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
        Operation::Power,
        Operation::SquareRoot,
    ];

    let mut tools = operations
        .into_iter()
        .map(|op| {
            ToolDefinition::builder(op.name())
                .description(op.description())
                .parameters(op.parameters())
                .capability(Capability::Stateful)
                .stateful(Arithmetic(op))
                .build()
        })
        .collect::<tooloop_core::Result<Vec<_>>>()?;

    tools.push(
        ToolDefinition::builder("ShowResult")
            .description("Show the final result and stop execution")
            .capability(Capability::StopStateful)
            .stateful(ShowResult)
            .build()?,
    );

    Ok(tools)
}

/// Text rendering of the final calculator state
pub fn summarize(state: &AgentState) -> String {
    match state.get("result") {
        Some(Value::Null) | None => "No result has been calculated yet.".to_string(),
        Some(result) => format!("Final result: {}", result),
    }
}
