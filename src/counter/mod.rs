//! Local counter store
//!
//! An integer counter with increment/decrement actions, persisted to a
//! JSON storage file after every change and observable through selector
//! subscriptions. Only the count itself is persisted.

use crate::error::{TallyError, TallyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::fs;
use tracing::debug;

/// Persisted slice of the counter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    pub count: i64,
}

/// On-disk envelope, keyed by storage name
#[derive(Debug, Serialize, Deserialize)]
struct Stored {
    name: String,
    state: CounterState,
    saved_at: DateTime<Utc>,
}

type CounterListener = Box<dyn FnMut(&CounterState, &CounterState) + Send>;

struct Watcher {
    id: u64,
    callback: CounterListener,
}

#[derive(Default)]
struct Watchers {
    next_id: u64,
    list: Vec<Watcher>,
}

/// Counter with file-backed persistence
///
/// A change is written to disk before it becomes visible; changes are saved
/// one at a time in the order they were made.
pub struct CounterStore {
    name: String,
    path: PathBuf,
    state: Mutex<CounterState>,
    saving: tokio::sync::Mutex<()>,
    watchers: Arc<Mutex<Watchers>>,
}

/// Handle returned by `CounterStore::subscribe`; dropping it unsubscribes
#[must_use = "dropping a CounterSubscription unsubscribes immediately"]
pub struct CounterSubscription {
    watchers: Arc<Mutex<Watchers>>,
    id: u64,
}

impl Drop for CounterSubscription {
    fn drop(&mut self) {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.list.retain(|w| w.id != self.id);
    }
}

impl CounterStore {
    /// Load the counter stored at `path`, starting from zero if absent
    pub async fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> TallyResult<Self> {
        let name = name.into();
        let path = path.into();
        let state = Self::load(&name, &path).await?;
        debug!("Counter {} loaded with count {}", name, state.count);

        Ok(Self {
            name,
            path,
            state: Mutex::new(state),
            saving: tokio::sync::Mutex::new(()),
            watchers: Arc::new(Mutex::new(Watchers::default())),
        })
    }

    async fn load(name: &str, path: &Path) -> TallyResult<CounterState> {
        if !path.exists() {
            return Ok(CounterState { count: 0 });
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| TallyError::io(format!("reading counter file {}", path.display()), e))?;
        let stored: Stored =
            serde_json::from_str(&content).map_err(|e| TallyError::StorageCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if stored.name != name {
            return Err(TallyError::StorageCorrupt {
                path: path.to_path_buf(),
                reason: format!("holds store '{}', expected '{}'", stored.name, name),
            });
        }
        Ok(stored.state)
    }

    fn lock(&self) -> MutexGuard<'_, CounterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current count
    pub fn count(&self) -> i64 {
        self.lock().count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add one and persist
    pub async fn increase_one(&self) -> TallyResult<i64> {
        self.set(|state| state.count += 1).await
    }

    /// Subtract one and persist
    pub async fn decrease_one(&self) -> TallyResult<i64> {
        self.set(|state| state.count -= 1).await
    }

    async fn set(&self, f: impl FnOnce(&mut CounterState)) -> TallyResult<i64> {
        let _saving = self.saving.lock().await;

        let previous = *self.lock();
        let mut current = previous;
        f(&mut current);

        self.save(current).await?;
        *self.lock() = current;
        self.notify(&current, &previous);
        Ok(current.count)
    }

    fn notify(&self, current: &CounterState, previous: &CounterState) {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        for watcher in watchers.list.iter_mut() {
            (watcher.callback)(current, previous);
        }
    }

    async fn save(&self, state: CounterState) -> TallyResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TallyError::io("creating counter storage directory", e))?;
        }

        let stored = Stored {
            name: self.name.clone(),
            state,
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, content).await.map_err(|e| {
            TallyError::io(format!("writing counter file {}", self.path.display()), e)
        })?;
        Ok(())
    }

    /// Watch a projection of the state
    ///
    /// `listener` receives `(current, previous)` projections and only fires
    /// when the projection changes.
    pub fn subscribe<S, F, L>(&self, selector: F, mut listener: L) -> CounterSubscription
    where
        S: PartialEq + Send + 'static,
        F: Fn(&CounterState) -> S + Send + 'static,
        L: FnMut(&S, &S) + Send + 'static,
    {
        let callback: CounterListener = Box::new(move |current, previous| {
            let (current, previous) = (selector(current), selector(previous));
            if current != previous {
                listener(&current, &previous);
            }
        });

        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.next_id += 1;
        let id = watchers.next_id;
        watchers.list.push(Watcher { id, callback });

        CounterSubscription {
            watchers: Arc::clone(&self.watchers),
            id,
        }
    }
}
