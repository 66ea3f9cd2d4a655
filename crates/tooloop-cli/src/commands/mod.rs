// CLI subcommands

pub mod calculator;
pub mod cart;

use tooloop_core::{RunRequest, ToolChoice, ToolDefinition};

/// Settings shared by every demo run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub model: String,
    pub tool_choice: ToolChoice,
    pub parallel_tool_calls: bool,
    pub verbose: bool,
}

impl RunOptions {
    pub fn request(
        &self,
        prompt: impl Into<String>,
        budget: usize,
        tools: Vec<ToolDefinition>,
    ) -> RunRequest {
        RunRequest::new(&self.model, prompt)
            .budget(budget)
            .tools(tools)
            .tool_choice(self.tool_choice.clone())
            .parallel_tool_calls(self.parallel_tool_calls)
    }
}
