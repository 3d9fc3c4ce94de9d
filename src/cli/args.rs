//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tally - todo list client with a normalized, optimistic cache
///
/// Talks to a todo REST API (or an in-process backend with --memory) and
/// keeps a local counter.
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .tally.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Use the in-process backend instead of the REST API
    #[arg(long, global = true)]
    pub memory: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List todos
    List(ListArgs),

    /// Show a single todo
    Show {
        /// Todo id
        id: String,
    },

    /// Add a todo
    Add {
        /// Todo text (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },

    /// Flip a todo between done and not done
    Toggle {
        /// Todo id
        id: String,
    },

    /// Change a todo's text or done flag
    Edit(EditArgs),

    /// Remove a todo
    Remove {
        /// Todo id
        id: String,
    },

    /// Show or change the local counter
    Counter(CounterArgs),

    /// Check the configured backend
    Status,

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the edit command
#[derive(Parser, Debug)]
pub struct EditArgs {
    /// Todo id
    pub id: String,

    /// New text
    #[arg(long)]
    pub content: Option<String>,

    /// Mark done (true) or not done (false)
    #[arg(long)]
    pub done: Option<bool>,
}

/// Arguments for the counter command
#[derive(Parser, Debug)]
pub struct CounterArgs {
    #[command(subcommand)]
    pub action: Option<CounterAction>,
}

/// Counter subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAction {
    /// Print the current count
    Show,
    /// Add one
    Inc,
    /// Subtract one
    Dec,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., api.base_url)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
