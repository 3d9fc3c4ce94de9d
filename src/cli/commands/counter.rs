//! Counter command - show or step the local counter

use crate::cli::args::{CounterAction, CounterArgs};
use crate::config::{Config, ConfigManager};
use crate::counter::CounterStore;
use crate::error::TallyResult;
use tracing::info;

/// Execute the counter command
pub async fn execute(args: CounterArgs, config: &Config) -> TallyResult<()> {
    let path = ConfigManager::counter_path(config);
    let store = CounterStore::open(&config.counter.storage_name, path).await?;

    let _log = store.subscribe(
        |state| state.count,
        |count, previous| info!("counter changed {} -> {}", previous, count),
    );

    let count = match args.action.unwrap_or(CounterAction::Show) {
        CounterAction::Show => store.count(),
        CounterAction::Inc => store.increase_one().await?,
        CounterAction::Dec => store.decrease_one().await?,
    };

    println!("{}", count);
    Ok(())
}
