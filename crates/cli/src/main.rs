//! RoomScout CLI: the main entry point.
//!
//! Commands:
//! - `search`  : Run one lodging search and print the answer
//! - `serve`   : Start the HTTP gateway with the search UI
//! - `tools`   : Start the tool server and list its tools
//! - `config`  : Show, validate or locate the configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "roomscout",
    about = "RoomScout: natural-language lodging search over an MCP tool server",
    version,
    author
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
    /// Run a single search and print the final answer
    Search {
        /// What you are looking for, in plain language
        prompt: String,

        /// Override the tool-call budget
        #[arg(long)]
        max_tool_calls: Option<u32>,

        /// Override the model
        #[arg(long, env = "ROOMSCOUT_MODEL")]
        model: Option<String>,
    },

    /// Start the HTTP gateway and web UI
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the tools offered by the configured tool server
    Tools,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Check the configuration for problems
    Validate,
    /// Print the config file location
    Path,
    /// Print a config file with every default filled in
    Default,
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
        Commands::Search {
            prompt,
            max_tool_calls,
            model,
        } => commands::search::run(prompt, max_tool_calls, model).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Default => commands::config_cmd::defaults().await?,
        },
    }

    Ok(())
}
