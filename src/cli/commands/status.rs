//! Status command - check the configured backend and local storage

use crate::config::{Config, ConfigManager};
use crate::error::TallyResult;
use crate::service::{create_service, Backend};
use console::{style, Emoji};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");

/// Execute the status command
pub async fn execute(config: &Config, backend: Backend) -> TallyResult<()> {
    println!("{}", style("Tally Status").bold().cyan());
    println!();

    println!("{}", style("Backend:").bold());
    println!("  {} Using: {}", CHECK, backend.name());
    if backend == Backend::Http {
        println!("  {} URL: {}", CHECK, config.api.base_url);
    }

    let service = create_service(config, backend);
    let reachable = match service.list().await {
        Ok(todos) => {
            println!(
                "  {} {} ({} todos)",
                CHECK,
                style("Reachable").green(),
                todos.len()
            );
            true
        }
        Err(e) => {
            println!("  {} {} - {}", CROSS, style("Unreachable").red(), e);
            false
        }
    };

    println!();
    println!("{}", style("Cache:").bold());
    println!("  {} Stale after: {}s", CHECK, config.cache.stale_time_secs);
    println!("  {} Collected after: {}s", CHECK, config.cache.gc_time_secs);

    println!();
    println!("{}", style("Counter:").bold());
    println!(
        "  {} Storage: {}",
        CHECK,
        ConfigManager::counter_path(config).display()
    );

    println!();
    if reachable {
        println!("{}", style("Backend is ready").green().bold());
    } else {
        println!(
            "{}",
            style("Backend is unreachable - run with --memory or check api.base_url")
                .yellow()
                .bold()
        );
    }

    Ok(())
}
