use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "synapse")]
#[command(version, about = "AI agent team that builds a web app from a prompt")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Maximum number of stages running at once. Overrides synapse.toml.
    #[arg(long, global = true)]
    pub max_parallel: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the agent workflow for a prompt
    Run {
        /// What the agents should build. Asked interactively if omitted.
        prompt: Option<String>,

        /// Use the built-in sample generator instead of the claude CLI
        #[arg(long)]
        offline: bool,

        /// UI output mode: full, minimal, json
        #[arg(long, default_value = "full")]
        ui: String,
    },
    /// Retry a failed stage from the last recorded run
    Retry {
        /// Numeric id of the failed stage
        stage_id: u32,

        /// Use the built-in sample generator instead of the claude CLI
        #[arg(long)]
        offline: bool,

        /// UI output mode: full, minimal, json
        #[arg(long, default_value = "full")]
        ui: String,
    },
    /// Show the last recorded run
    Status,
    /// Clear the saved workspace, run history, and settings
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// Serve the studio HTTP and WebSocket API
    Serve {
        /// Bind host. Overrides synapse.toml.
        #[arg(long)]
        host: Option<String>,

        /// Bind port. Overrides synapse.toml.
        #[arg(short, long)]
        port: Option<u16>,

        /// Use the built-in sample generator instead of the claude CLI
        #[arg(long)]
        offline: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default synapse.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "synapse=debug,info" } else { "synapse=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // The serve command logs to a file instead; see cmd::serve.
    if !matches!(cli.command, Commands::Serve { .. }) {
        init_tracing(cli.verbose);
    }

    match &cli.command {
        Commands::Run { prompt, offline, ui } => {
            cmd::cmd_run(&cli, project_dir, prompt.clone(), *offline, ui).await?;
        }
        Commands::Retry {
            stage_id,
            offline,
            ui,
        } => {
            cmd::cmd_retry(&cli, project_dir, *stage_id, *offline, ui).await?;
        }
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Reset { force } => cmd::cmd_reset(&cli, &project_dir, *force)?,
        Commands::Serve {
            host,
            port,
            offline,
        } => {
            cmd::cmd_serve(&cli, project_dir, host.clone(), *port, *offline).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
