use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "propchat", version)]
#[command(
    about = "Property-listing chat assistant backed by Gemini",
    long_about = "Property-listing chat assistant backed by Gemini\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default probe path when --config is not provided:\n    1. $XDG_CONFIG_HOME/propchat/config.toml\n    2. ~/.config/propchat/config.toml\n\nThe API key is read from GEMINI_API_KEY (environment or .env)."
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Listing data: a single text file or a folder of text files.
    #[arg(long, value_name = "PATH", global = true)]
    pub data: Option<PathBuf>,

    /// File holding the remaining-request counter.
    #[arg(long, value_name = "PATH", global = true)]
    pub usage_file: Option<PathBuf>,

    /// Enable debug logging (including redacted HTTP traffic).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Chat in the terminal (default).
    Chat,

    /// Serve the chat page and the POST /chat endpoint.
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the remaining request count, or reset it.
    Usage {
        /// Delete the persisted counter so the full limit is available again.
        #[arg(long)]
        reset: bool,
    },
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }
}
