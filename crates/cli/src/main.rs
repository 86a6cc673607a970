//! Switchyard CLI.
//!
//! Commands:
//! - `skills`: List skill bundles and the ones that failed to load
//! - `classify`: Show which playbooks a message would trigger
//! - `check-reply`: Run the reply diagnostics on a piece of model output
//! - `ask`: Send one message through the full pipeline
//! - `doctor`: Check configuration and the skills directory

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod builtin;
mod commands;

#[derive(Parser)]
#[command(
    name = "switchyard",
    about = "Switchyard: tool orchestration runtime for LLM agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List skill bundles in the skills directory
    Skills {
        /// Skills directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print playbooks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which playbooks a message would trigger
    Classify {
        message: String,

        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Check model output for claimed actions, needless refusals and leaked tool calls
    CheckReply {
        text: String,

        /// Tool available to the model (repeatable)
        #[arg(long = "tool")]
        tools: Vec<String>,
    },

    /// Send one message through the full pipeline
    Ask {
        message: String,

        #[arg(long, default_value = "cli")]
        agent: String,

        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Check configuration and the skills directory
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Skills { dir, json } => commands::skills::run(dir, json)?,
        Commands::Classify { message, dir } => commands::classify::run(&message, dir)?,
        Commands::CheckReply { text, tools } => commands::check_reply::run(&text, &tools)?,
        Commands::Ask { message, agent, dir } => commands::ask::run(message, agent, dir).await?,
        Commands::Doctor => commands::doctor::run()?,
    }

    Ok(())
}
