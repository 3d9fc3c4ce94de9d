//! Background garbage collection for cache stores

use super::key::QueryKey;
use super::store::CacheStore;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Periodically evict idle, unobserved entries from `store`
///
/// `links` names the keys a value depends on; see
/// `CacheStore::collect_garbage_linked`. Runs every `interval` until the
/// returned handle is aborted.
pub fn spawn_gc<V, L>(
    store: CacheStore<V>,
    interval: Duration,
    gc_time: Duration,
    links: L,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
    L: Fn(&V) -> Vec<QueryKey> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = store.collect_garbage_linked(gc_time, &links);
            if evicted > 0 {
                debug!("gc pass evicted {} entries", evicted);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn background_gc_evicts_idle_entries() {
        let store = CacheStore::new();
        let key = QueryKey::new(["todo", "detail", "1"]);
        store.write(&key, 1);

        let handle = spawn_gc(
            store.clone(),
            Duration::from_secs(1),
            Duration::from_secs(5),
            |_: &i32| Vec::new(),
        );
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.contains(&key));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!store.contains(&key));
        handle.abort();
    }
}
