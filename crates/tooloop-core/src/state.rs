// Agent state
//
// The state is an opaque JSON value owned by the agent loop. Stateful tools
// receive it by value and hand back a full replacement; the dispatcher checks
// that the replacement keeps the same JSON kind before adopting it.

use serde_json::Value;

/// Caller-defined application state threaded through a run
pub type AgentState = Value;

/// JSON kind of a value, used for state shape checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateShape {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl StateShape {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => StateShape::Null,
            Value::Bool(_) => StateShape::Bool,
            Value::Number(_) => StateShape::Number,
            Value::String(_) => StateShape::String,
            Value::Array(_) => StateShape::Array,
            Value::Object(_) => StateShape::Object,
        }
    }

    /// Whether a replacement of shape `other` may stand in for this one.
    ///
    /// A `null` state has no established shape and accepts anything.
    pub fn accepts(self, other: StateShape) -> bool {
        self == StateShape::Null || self == other
    }
}

impl std::fmt::Display for StateShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StateShape::Null => "null",
            StateShape::Bool => "boolean",
            StateShape::Number => "number",
            StateShape::String => "string",
            StateShape::Array => "array",
            StateShape::Object => "object",
        };
        f.write_str(name)
    }
}
