//! Optimistic updates with rollback
//!
//! An update runs in two halves. `PendingUpdate::begin` is synchronous:
//! it cancels any in-flight fetch of the record, snapshots the cached
//! value and writes the merged record so watchers see the change at once.
//! `PendingUpdate::settle` makes the server call and, if it fails, puts the
//! snapshot back exactly as it was.
//!
//! Settlement never forces a refetch. Two overlapping updates of the same
//! record race: the cache shows whichever was applied last.

use super::{TodoCacheValue, TodoClient};
use crate::cache::CacheStore;
use crate::error::TallyResult;
use crate::service::TodoService;
use crate::todo::{keys, Todo, TodoPatch};
use std::sync::Arc;
use tracing::{debug, warn};

/// An update that has been applied to the cache but not yet confirmed
#[must_use = "the server call only happens in settle()"]
pub struct PendingUpdate {
    service: Arc<dyn TodoService>,
    cache: CacheStore<TodoCacheValue>,
    id: String,
    patch: TodoPatch,
    snapshot: Option<Todo>,
    optimistic: Option<Todo>,
}

impl PendingUpdate {
    pub(super) fn begin(client: &TodoClient, id: &str, patch: TodoPatch) -> Self {
        let key = keys::detail(id);
        let cache = client.cache.clone();

        cache.cancel(&key);

        let mut snapshot = None;
        let mut optimistic = None;
        cache.update(&key, |prev| {
            let current = prev.and_then(TodoCacheValue::as_todo)?;
            let merged = current.merged(&patch);
            snapshot = Some(current.clone());
            optimistic = Some(merged.clone());
            Some(TodoCacheValue::Record(merged))
        });

        if optimistic.is_none() {
            debug!("todo {} not cached, updating without optimistic write", id);
        }

        Self {
            service: Arc::clone(&client.service),
            cache,
            id: id.to_string(),
            patch,
            snapshot,
            optimistic,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cached value before the update was applied
    pub fn snapshot(&self) -> Option<&Todo> {
        self.snapshot.as_ref()
    }

    /// Value written to the cache ahead of the server
    pub fn optimistic(&self) -> Option<&Todo> {
        self.optimistic.as_ref()
    }

    /// Send the update to the server and reconcile the cache
    ///
    /// On success the optimistic value stays. On failure the snapshot is
    /// restored verbatim and the service error is returned.
    pub async fn settle(self) -> TallyResult<Todo> {
        match self.service.update(&self.id, &self.patch).await {
            Ok(todo) => {
                debug!("update of todo {} confirmed", self.id);
                Ok(todo)
            }
            Err(e) => {
                if let Some(snapshot) = self.snapshot {
                    self.cache
                        .write(&keys::detail(&self.id), TodoCacheValue::Record(snapshot));
                    warn!("update of todo {} failed, rolled back: {}", self.id, e);
                }
                Err(e)
            }
        }
    }
}
