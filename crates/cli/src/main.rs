//! Rivet CLI: the main entry point.
//!
//! Commands:
//! - `config`   Show, validate or locate the configuration
//! - `classify` Map a provider error message to its canonical code
//! - `view`     Render the model's view of a saved transcript
//! - `demo`     Run one scripted turn end to end

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rivet", about = "Rivet: turn runtime for tool-using agents", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Classify an error message into a canonical LLM error code
    Classify {
        /// The error message, e.g. "HTTP 429: rate limit exceeded"
        message: String,
    },

    /// Print the conversation view built from a transcript file
    View {
        /// A JSON session or JSON array of messages
        transcript: PathBuf,

        /// Flatten tool history as if the model had changed
        #[arg(long)]
        flatten: bool,
    },

    /// Run a scripted turn against the configured limits
    Demo {
        /// Activate plan capture so tool calls are recorded, not run
        #[arg(long)]
        plan: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Load and validate the configuration
    Validate,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Classify { message } => commands::classify::run(&message)?,
        Commands::View { transcript, flatten } => commands::view::run(&transcript, flatten).await?,
        Commands::Demo { plan } => commands::demo::run(plan).await?,
    }

    Ok(())
}
