// Tooloop CLI
//
// Design Decision: Use clap derive with env fallbacks so a .env file is enough to run.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Demo tool sets live in this crate; the core stays tool-agnostic.

mod commands;
mod demos;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tooloop_core::ToolChoice;
use tooloop_openai::{OpenAiProvider, DEFAULT_BASE_URL};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tooloop")]
#[command(about = "Tooloop CLI - Run tool-calling agents against an OpenAI-compatible model")]
#[command(version)]
pub struct Cli {
    /// Model identifier
    #[arg(long, short, env = "TOOLOOP_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Tool choice: auto, required, or tool:<name>
    #[arg(long, default_value = "auto")]
    pub tool_choice: String,

    /// Allow several tool calls per model turn
    #[arg(long)]
    pub parallel_tool_calls: bool,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Log every step and tool call
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the calculator agent
    Calculator {
        /// Calculation task (defaults to a multi-step example)
        prompt: Option<String>,

        /// Maximum number of steps
        #[arg(long, default_value = "10")]
        budget: usize,
    },

    /// Run a shopping session, one agent run per instruction
    Cart {
        /// Instructions, run in order (defaults to an example session)
        instructions: Vec<String>,

        /// Maximum number of steps per instruction
        #[arg(long, default_value = "6")]
        budget: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before parsing so env fallbacks see it
    let dotenv_path = dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(path) = dotenv_path {
        tracing::debug!("Loaded .env from {:?}", path);
    }

    let api_key = cli
        .api_key
        .filter(|key| !key.trim().is_empty())
        .context("OPENAI_API_KEY is not set; export it or pass --api-key")?;
    let provider = OpenAiProvider::with_api_key(api_key).with_base_url(&cli.base_url);

    let tool_choice: ToolChoice = cli.tool_choice.parse()?;
    let options = commands::RunOptions {
        model: cli.model,
        tool_choice,
        parallel_tool_calls: cli.parallel_tool_calls,
        verbose: cli.verbose,
    };
    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Calculator { prompt, budget } => {
            let prompt = prompt.unwrap_or_else(|| demos::calculator::DEFAULT_TASK.to_string());
            commands::calculator::run(provider, &options, output_format, &prompt, budget).await?;
        }
        Commands::Cart {
            instructions,
            budget,
        } => {
            let instructions = if instructions.is_empty() {
                demos::cart::DEFAULT_INSTRUCTIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            } else {
                instructions
            };
            commands::cart::run(provider, &options, output_format, &instructions, budget).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
