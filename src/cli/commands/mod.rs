mod subcommands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "concierge")]
#[command(about = "Inspect and maintain the assistant's durable state")]
pub struct Cli {
    /// Config file to use instead of ~/.concierge/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's usage and any pending plan
    Status,
    /// Inspect or discard the pending clarification plan
    Pending {
        #[command(subcommand)]
        cmd: PendingCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum PendingCommands {
    /// Print the pending plan as JSON
    Show,
    /// Discard the pending plan
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as JSON
    Show,
    /// Print the config file location
    Path,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Status => {
            subcommands::status_command(config_path)?;
        }
        Commands::Pending { cmd } => match cmd {
            PendingCommands::Show => subcommands::pending_show(config_path)?,
            PendingCommands::Clear => subcommands::pending_clear(config_path)?,
        },
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Init { force } => {
                subcommands::config_init(config_path, force)?;
            }
            ConfigCommands::Show => subcommands::config_show(config_path)?,
            ConfigCommands::Path => subcommands::config_path(config_path)?,
        },
    }

    Ok(())
}
