//! Tally - todo list client
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tally::cli::{commands, Cli, Commands};
use tally::config::{Config, ConfigManager};
use tally::error::{TallyError, TallyResult};
use tally::service::Backend;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> TallyResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| TallyError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    match local_config_path {
        Some(ref path) => debug!("Using local config: {}", path.display()),
        None if cli.no_local => debug!("Local config discovery disabled (--no-local)"),
        None => {}
    }

    let backend = Backend::from_flag(cli.memory);
    debug!("Backend: {}", backend.name());

    match cli.command {
        Commands::List(args) => commands::list(args, &config, backend).await,
        Commands::Show { id } => commands::show(&id, &config, backend).await,
        Commands::Add { content } => commands::add(content, &config, backend).await,
        Commands::Toggle { id } => commands::toggle(&id, &config, backend).await,
        Commands::Edit(args) => commands::edit(args, &config, backend).await,
        Commands::Remove { id } => commands::remove(&id, &config, backend).await,
        Commands::Counter(args) => commands::counter(args, &config).await,
        Commands::Status => commands::status(&config, backend).await,
        Commands::Config(args) => commands::config(args, &config, &config_manager).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `general.verbose` counts as one `-v`
fn init_logging(verbose: u8, config: &Config) {
    let level = verbose.max(u8::from(config.general.verbose));
    let filter = match level {
        0 => EnvFilter::new("tally=warn"),
        1 => EnvFilter::new("tally=info"),
        _ => EnvFilter::new("tally=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
