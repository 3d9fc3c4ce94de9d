//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{TallyError, TallyResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

const VALID_KEYS: &[&str] = &[
    "general.verbose",
    "general.log_format",
    "api.base_url",
    "api.timeout_secs",
    "cache.stale_time_secs",
    "cache.gc_time_secs",
    "counter.storage_name",
    "counter.path",
];

/// Execute the config command
///
/// `manager` points at the file selected by `--config` (or the default).
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> TallyResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> TallyResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> TallyResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Update one key in the file itself, leaving local overrides out of it
async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> TallyResult<()> {
    let ctx = UiContext::detect();
    let mut config = manager.load().await?;

    if let Err(e) = apply(&mut config, key, value) {
        if matches!(e, TallyError::User(_)) && !VALID_KEYS.contains(&key) {
            ui::step_error_detail(&ctx, "Unknown config key", key);
            ui::remark(&ctx, &format!("Valid keys: {}", VALID_KEYS.join(", ")));
        }
        return Err(e);
    }

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> TallyResult<()> {
    match key {
        "general.verbose" => config.general.verbose = parse_bool(value)?,
        "general.log_format" => config.general.log_format = parse_log_format(value)?,
        "api.base_url" => config.api.base_url = value.trim_end_matches('/').to_string(),
        "api.timeout_secs" => config.api.timeout_secs = parse_u64(value)?,
        "cache.stale_time_secs" => config.cache.stale_time_secs = parse_u64(value)?,
        "cache.gc_time_secs" => config.cache.gc_time_secs = parse_u64(value)?,
        "counter.storage_name" => config.counter.storage_name = value.to_string(),
        "counter.path" => {
            config.counter.path = (!value.is_empty()).then(|| PathBuf::from(value))
        }
        _ => return Err(TallyError::User(format!("Unknown config key: {}", key))),
    }
    Ok(())
}

fn parse_bool(value: &str) -> TallyResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(TallyError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> TallyResult<u64> {
    value
        .parse()
        .map_err(|_| TallyError::User(format!("Invalid number: {}", value)))
}

fn parse_log_format(value: &str) -> TallyResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(TallyError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}
