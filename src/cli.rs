use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gemini-key-rotator",
    version,
    about = "Gemini API service with transparent API key rotation",
    long_about = "Serves the requirements assistant and code generator endpoints on top of the Gemini API. \
A call that hits a quota or rate limit is retried immediately on the next configured key until one succeeds or every key is exhausted."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Server bind address (overrides the config file)
    #[arg(long, env = "GEMINI_ROTATOR_HOST")]
    pub host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(short, long, env = "GEMINI_ROTATOR_PORT")]
    pub port: Option<u16>,

    /// Default log filter, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "GEMINI_ROTATOR_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Load and validate the configuration, then print it
    Config {
        /// Print the full effective configuration as YAML
        #[arg(short, long)]
        verbose: bool,
    },

    /// Key management commands
    Keys {
        #[command(subcommand)]
        action: KeyCommands,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum KeyCommands {
    /// List configured keys (previews only)
    List,

    /// Send a short prompt with every key and report which ones work
    Test {
        /// Model to probe with (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn effective_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
