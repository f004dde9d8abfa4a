//! Agentry CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Answer one request with the customer-service agent
//! - `demo`    — Run the canned customer-service queries
//! - `tools`   — Print the tool capabilities advertised to the model
//! - `config`  — Show the effective configuration

use agentry_tools::ToolSet;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agentry",
    about = "Agentry — an iterative agent driver and tool-dispatch engine",
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
    /// Answer a single request
    Run {
        /// The request to send to the agent
        #[arg(short, long)]
        message: String,

        /// Tool set to advertise: specific or generic
        #[arg(long, default_value = "specific")]
        tools: ToolSet,

        /// Override the iteration budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override the model
        #[arg(long)]
        model: Option<String>,

        /// Print the recorded run trace as JSON after the answer
        #[arg(long)]
        trace: bool,
    },

    /// Run the canned customer-service queries against one user store
    Demo {
        /// Tool set to advertise: specific or generic
        #[arg(long, default_value = "specific")]
        tools: ToolSet,
    },

    /// Print the tool capabilities advertised to the model
    Tools {
        /// Tool set to describe: specific or generic
        #[arg(long, default_value = "specific")]
        tools: ToolSet,
    },

    /// Show the effective configuration (API key redacted)
    Config {
        /// Print the default configuration instead
        #[arg(long)]
        default: bool,

        /// Print the config file path
        #[arg(long, conflicts_with = "default")]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            message,
            tools,
            max_iterations,
            model,
            trace,
        } => {
            let overrides = commands::Overrides {
                max_iterations,
                model,
            };
            commands::run::run(&message, tools, overrides, trace).await?
        }
        Commands::Demo { tools } => commands::demo::run(tools).await?,
        Commands::Tools { tools } => commands::tools::run(tools)?,
        Commands::Config { default, path } => commands::config_cmd::run(default, path)?,
    }

    Ok(())
}
