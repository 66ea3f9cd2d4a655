// Calculator command

use crate::commands::RunOptions;
use crate::demos::calculator;
use crate::output::{print_field, OutputFormat};
use anyhow::Result;
use tooloop_core::{Agent, AgentConfig, LlmProvider, RunReport};

pub async fn run<P: LlmProvider>(
    provider: P,
    options: &RunOptions,
    output: OutputFormat,
    prompt: &str,
    budget: usize,
) -> Result<RunReport> {
    let config = AgentConfig::new()
        .with_system_prompt(calculator::SYSTEM_PROMPT)
        .with_initial_state(calculator::initial_state())
        .with_verbose(options.verbose);
    let mut agent = Agent::new(provider, config);

    let report = agent
        .run_detailed(options.request(prompt, budget, calculator::tools()?))
        .await?;

    if output.is_text() {
        print_field("Status", &format!("{:?}", report.status));
        print_field("LLM calls", &report.provider_calls.to_string());
        print_field("Tool calls", &report.dispatches.to_string());
        println!();
        println!("{}", calculator::summarize(&report.state));
    } else {
        output.print_value(&report)?;
    }

    Ok(report)
}
