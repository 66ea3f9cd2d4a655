// Shopping cart command
//
// Runs each instruction as its own agent run and carries the cart state from
// one run to the next.

use crate::commands::RunOptions;
use crate::demos::cart::{self, CartState};
use crate::output::{print_field, print_rule, OutputFormat};
use anyhow::Result;
use serde::Serialize;
use tooloop_core::{Agent, AgentConfig, AgentState, LlmProvider, RunStatus};

/// Outcome of one instruction
#[derive(Debug, Clone, Serialize)]
pub struct CartStep {
    pub instruction: String,
    pub status: RunStatus,
    pub state: AgentState,
}

/// Outcome of the whole session
#[derive(Debug, Clone, Serialize)]
pub struct CartSession {
    pub steps: Vec<CartStep>,
    pub final_state: AgentState,
}

pub async fn run<P: LlmProvider>(
    provider: P,
    options: &RunOptions,
    output: OutputFormat,
    instructions: &[String],
    budget: usize,
) -> Result<CartSession> {
    let config = AgentConfig::new()
        .with_system_prompt(cart::SYSTEM_PROMPT)
        .with_verbose(options.verbose);
    let mut agent = Agent::new(provider, config);

    let mut current_state = agent.state().clone();
    let mut steps = Vec::with_capacity(instructions.len());

    if output.is_text() {
        println!("Starting shopping session...");
        print_rule(50);
    }

    for (i, instruction) in instructions.iter().enumerate() {
        if output.is_text() {
            println!();
            println!("Step {}: {}", i + 1, instruction);
        }

        agent.set_state(current_state);
        let report = agent
            .run_detailed(options.request(instruction.as_str(), budget, cart::tools()?))
            .await?;
        current_state = report.state;

        if output.is_text() {
            print_cart_summary(&current_state);
            print_rule(50);
        }

        steps.push(CartStep {
            instruction: instruction.clone(),
            status: report.status,
            state: current_state.clone(),
        });
    }

    let session = CartSession {
        steps,
        final_state: current_state,
    };

    if output.is_text() {
        println!();
        println!("Shopping session completed!");
        if let Ok(cart) = CartState::from_state(&session.final_state) {
            println!("{}", cart.render());
        }
    } else {
        output.print_value(&session)?;
    }

    Ok(session)
}

fn print_cart_summary(state: &AgentState) {
    match CartState::from_state(state) {
        Ok(cart) if !cart.cart.is_empty() => {
            print_field("Items", &cart.cart.len().to_string());
            print_field("Total", &format!("${:.2}", cart.total));
            if cart.checked_out {
                print_field("Checked out", "yes");
            }
        }
        Ok(_) => println!("Cart is empty"),
        Err(message) => println!("{}", message),
    }
}
