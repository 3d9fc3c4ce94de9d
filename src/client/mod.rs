//! Normalized todo cache client
//!
//! Wraps a `TodoService` and a `CacheStore` and keeps the two cache views
//! consistent:
//!
//! - `["todo", "list"]` holds the ordered ids
//! - `["todo", "detail", id]` holds each record
//!
//! The list query is the bulk path that fills detail entries; detail
//! queries either read the warm cache or fetch a single record. Mutations
//! reconcile both views once the server answers, except updates, which are
//! applied optimistically and rolled back on failure (see `PendingUpdate`).

mod optimistic;

pub use optimistic::PendingUpdate;

use crate::cache::{spawn_gc, CacheStore, QueryKey, Subscription};
use crate::config::schema::CacheConfig;
use crate::error::{TallyError, TallyResult};
use crate::service::TodoService;
use crate::todo::{keys, Todo, TodoPatch};
use std::iter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Value stored under a todo cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoCacheValue {
    /// Ordered id sequence under the list key
    Ids(Vec<String>),
    /// A full record under a detail key
    Record(Todo),
}

impl TodoCacheValue {
    pub fn as_ids(&self) -> Option<&[String]> {
        match self {
            Self::Ids(ids) => Some(ids),
            Self::Record(_) => None,
        }
    }

    pub fn as_todo(&self) -> Option<&Todo> {
        match self {
            Self::Record(todo) => Some(todo),
            Self::Ids(_) => None,
        }
    }
}

/// How a detail query may resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMode {
    /// Read the cache only; a miss is a `CacheConsistency` error
    CacheOnly,
    /// Serve fresh cached data, otherwise fetch the record
    FetchIfMissing,
}

/// Freshness and retention windows for cached todos
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub stale_time: Duration,
    pub gc_time: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for QueryOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            stale_time: config.stale_time(),
            gc_time: config.gc_time(),
        }
    }
}

/// Todo queries and mutations over a shared cache
#[derive(Clone)]
pub struct TodoClient {
    service: Arc<dyn TodoService>,
    cache: CacheStore<TodoCacheValue>,
    options: QueryOptions,
}

impl TodoClient {
    /// Create a client with a fresh cache
    pub fn new(service: Arc<dyn TodoService>, options: QueryOptions) -> Self {
        Self::with_cache(service, CacheStore::new(), options)
    }

    /// Create a client over an existing cache
    pub fn with_cache(
        service: Arc<dyn TodoService>,
        cache: CacheStore<TodoCacheValue>,
        options: QueryOptions,
    ) -> Self {
        Self {
            service,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &CacheStore<TodoCacheValue> {
        &self.cache
    }

    /// Ids currently cached under the list key
    pub fn cached_ids(&self) -> Option<Vec<String>> {
        self.cache
            .read(&keys::list())
            .and_then(|value| value.as_ids().map(<[String]>::to_vec))
    }

    /// Record currently cached for `id`
    pub fn cached_todo(&self, id: &str) -> Option<Todo> {
        self.cache
            .read(&keys::detail(id))
            .and_then(|value| value.as_todo().cloned())
    }

    /// Fetch all todos and normalize them into the cache
    ///
    /// Every record lands under its detail key and the ids under the list
    /// key, published together. Returns ids in server order. On failure the
    /// cache is left as it was.
    pub async fn list(&self) -> TallyResult<Vec<String>> {
        let list_key = keys::list();
        let ticket = self.cache.begin_fetch(&list_key);

        let todos = match self.service.list().await {
            Ok(todos) => todos,
            Err(e) => {
                self.cache.fail_fetch(&ticket);
                return Err(e);
            }
        };

        let ids: Vec<String> = todos.iter().map(|todo| todo.id.clone()).collect();
        let details = todos
            .into_iter()
            .map(|todo| (keys::detail(&todo.id), TodoCacheValue::Record(todo)));
        let entries = details.chain(iter::once((list_key, TodoCacheValue::Ids(ids.clone()))));

        if self.cache.complete_fetch(&ticket, entries) {
            debug!("cached {} todos", ids.len());
        }
        Ok(ids)
    }

    /// Resolve one todo
    pub async fn detail(&self, id: &str, mode: DetailMode) -> TallyResult<Todo> {
        let key = keys::detail(id);

        match mode {
            DetailMode::CacheOnly => self
                .cached_todo(id)
                .ok_or_else(|| TallyError::CacheConsistency { id: id.to_string() }),
            DetailMode::FetchIfMissing => {
                if !self.cache.is_stale(&key, self.options.stale_time) {
                    if let Some(todo) = self.cached_todo(id) {
                        return Ok(todo);
                    }
                }

                let ticket = self.cache.begin_fetch(&key);
                let todo = match self.service.get_by_id(id).await {
                    Ok(todo) => todo,
                    Err(e) => {
                        self.cache.fail_fetch(&ticket);
                        return Err(e);
                    }
                };

                if self
                    .cache
                    .complete_fetch(&ticket, [(key, TodoCacheValue::Record(todo.clone()))])
                {
                    Ok(todo)
                } else {
                    // Superseded by a local write; that write is newer
                    Ok(self.cached_todo(id).unwrap_or(todo))
                }
            }
        }
    }

    /// Create a todo and append it to the cached list
    ///
    /// Callers reject blank content before calling. Nothing is cached until
    /// the server has assigned an id. A list fetch still in flight predates
    /// the new record and is discarded.
    pub async fn create(&self, content: &str) -> TallyResult<Todo> {
        let todo = self.service.create(content).await?;

        self.cache.batch(|tx| {
            tx.cancel(&keys::list());
            tx.write(&keys::detail(&todo.id), TodoCacheValue::Record(todo.clone()));
            tx.update(&keys::list(), |prev| {
                let mut ids = prev
                    .and_then(TodoCacheValue::as_ids)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                if !ids.contains(&todo.id) {
                    ids.push(todo.id.clone());
                }
                Some(TodoCacheValue::Ids(ids))
            });
        });

        info!("Created todo {}", todo.id);
        Ok(todo)
    }

    /// Apply `patch` to the cached record now; the server call happens in
    /// `PendingUpdate::settle`
    pub fn begin_update(&self, id: &str, patch: TodoPatch) -> PendingUpdate {
        PendingUpdate::begin(self, id, patch)
    }

    /// Optimistically update a todo, rolling back if the server refuses
    pub async fn update(&self, id: &str, patch: TodoPatch) -> TallyResult<Todo> {
        self.begin_update(id, patch).settle().await
    }

    /// Delete a todo, then drop it from both cache views
    ///
    /// A list fetch still in flight may include the record and is discarded.
    pub async fn delete(&self, id: &str) -> TallyResult<Todo> {
        let deleted = self.service.delete(id).await?;

        self.cache.batch(|tx| {
            tx.cancel(&keys::list());
            tx.remove(&keys::detail(&deleted.id));
            tx.update(&keys::list(), |prev| {
                let ids: Vec<String> = prev
                    .and_then(TodoCacheValue::as_ids)
                    .map(|ids| ids.iter().filter(|x| **x != deleted.id).cloned().collect())
                    .unwrap_or_default();
                Some(TodoCacheValue::Ids(ids))
            });
        });

        info!("Deleted todo {}", deleted.id);
        Ok(deleted)
    }

    /// Mark every cached todo entry stale
    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_prefix(&keys::all())
    }

    /// Watch one record; `listener` gets `(current, previous)`
    pub fn watch_todo<L>(&self, id: &str, listener: L) -> Subscription<TodoCacheValue>
    where
        L: FnMut(&Option<Todo>, &Option<Todo>) + Send + 'static,
    {
        self.cache.subscribe(
            &keys::detail(id),
            |value: Option<&TodoCacheValue>| value.and_then(TodoCacheValue::as_todo).cloned(),
            listener,
        )
    }

    /// Watch the id sequence; `listener` gets `(current, previous)`
    pub fn watch_ids<L>(&self, listener: L) -> Subscription<TodoCacheValue>
    where
        L: FnMut(&Option<Vec<String>>, &Option<Vec<String>>) + Send + 'static,
    {
        self.cache.subscribe(
            &keys::list(),
            |value: Option<&TodoCacheValue>| {
                value
                    .and_then(TodoCacheValue::as_ids)
                    .map(<[String]>::to_vec)
            },
            listener,
        )
    }

    /// Start background eviction of idle entries after `gc_time`
    ///
    /// A retained id list keeps the records it names, so the list never
    /// outlives its detail entries.
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        spawn_gc(
            self.cache.clone(),
            interval,
            self.options.gc_time,
            linked_details,
        )
    }
}

/// Detail keys referenced by a cached value
fn linked_details(value: &TodoCacheValue) -> Vec<QueryKey> {
    value
        .as_ids()
        .map(|ids| ids.iter().map(|id| keys::detail(id)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MemoryTodoService, Operation};

    fn todo(id: &str, content: &str, is_done: bool) -> Todo {
        Todo {
            id: id.to_string(),
            content: content.to_string(),
            is_done,
        }
    }

    fn seeded() -> (Arc<MemoryTodoService>, TodoClient) {
        let service = Arc::new(
            MemoryTodoService::with_todos(vec![todo("1", "a", false), todo("2", "b", true)])
                .with_sequential_ids(),
        );
        let client = TodoClient::new(service.clone(), QueryOptions::default());
        (service, client)
    }

    #[tokio::test]
    async fn list_normalizes_records_into_detail_entries() {
        let (service, client) = seeded();

        let ids = client.list().await.unwrap();

        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(client.cached_ids(), Some(ids.clone()));
        for server_todo in service.todos() {
            assert_eq!(client.cached_todo(&server_todo.id), Some(server_todo));
        }
    }

    #[tokio::test]
    async fn failed_list_writes_nothing() {
        let (service, client) = seeded();
        service.fail_next(Operation::List);

        let err = client.list().await.unwrap_err();

        assert!(err.is_service());
        assert!(client.cache().is_empty());
        assert!(!client.cache().is_fetching(&keys::list()));
    }

    #[tokio::test]
    async fn repeated_list_is_idempotent() {
        let (_service, client) = seeded();

        let first = client.list().await.unwrap();
        let first_details: Vec<_> = first.iter().map(|id| client.cached_todo(id)).collect();
        let second = client.list().await.unwrap();
        let second_details: Vec<_> = second.iter().map(|id| client.cached_todo(id)).collect();

        assert_eq!(first, second);
        assert_eq!(first_details, second_details);
    }

    #[tokio::test]
    async fn cache_only_detail_never_calls_the_service() {
        let (service, client) = seeded();
        client.list().await.unwrap();

        let todo = client.detail("1", DetailMode::CacheOnly).await.unwrap();

        assert_eq!(todo.content, "a");
        assert_eq!(service.calls(Operation::Get), 0);
    }

    #[tokio::test]
    async fn cache_only_miss_is_a_consistency_error() {
        let (service, client) = seeded();

        let err = client.detail("1", DetailMode::CacheOnly).await.unwrap_err();

        assert!(matches!(err, TallyError::CacheConsistency { ref id } if id == "1"));
        assert_eq!(service.calls(Operation::Get), 0);
    }

    #[tokio::test]
    async fn fetch_if_missing_fetches_once_then_serves_cache() {
        let (service, client) = seeded();

        let first = client.detail("2", DetailMode::FetchIfMissing).await.unwrap();
        let second = client.detail("2", DetailMode::FetchIfMissing).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.calls(Operation::Get), 1);
        assert_eq!(client.cached_todo("2"), Some(first));
    }

    #[tokio::test]
    async fn fetch_if_missing_refetches_invalidated_entries() {
        let (service, client) = seeded();
        client.list().await.unwrap();

        assert_eq!(client.invalidate_all(), 3);
        client.detail("1", DetailMode::FetchIfMissing).await.unwrap();

        assert_eq!(service.calls(Operation::Get), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_if_missing_refetches_after_stale_time() {
        let (service, client) = seeded();
        client.list().await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        client.detail("1", DetailMode::FetchIfMissing).await.unwrap();
        assert_eq!(service.calls(Operation::Get), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        client.detail("1", DetailMode::FetchIfMissing).await.unwrap();
        assert_eq!(service.calls(Operation::Get), 1);
    }

    #[tokio::test]
    async fn failed_detail_fetch_surfaces_service_error() {
        let (service, client) = seeded();
        service.fail_next(Operation::Get);

        let err = client.detail("1", DetailMode::FetchIfMissing).await.unwrap_err();

        assert!(err.is_service());
        assert!(client.cached_todo("1").is_none());
    }

    #[tokio::test]
    async fn create_appends_exactly_once() {
        let (_service, client) = seeded();
        client.list().await.unwrap();

        let created = client.create("c").await.unwrap();

        assert_eq!(created.id, "3");
        assert_eq!(client.cached_ids().unwrap(), vec!["1", "2", "3"]);
        assert_eq!(client.cached_todo("3"), Some(todo("3", "c", false)));
    }

    #[tokio::test]
    async fn create_without_cached_list_starts_one() {
        let (_service, client) = seeded();

        client.create("c").await.unwrap();

        assert_eq!(client.cached_ids().unwrap(), vec!["3"]);
    }

    #[tokio::test]
    async fn failed_create_leaves_cache_untouched() {
        let (service, client) = seeded();
        client.list().await.unwrap();
        service.fail_next(Operation::Create);

        let err = client.create("c").await.unwrap_err();

        assert_eq!(err.to_string(), "Create Todo Failed: simulated server error");
        assert_eq!(client.cached_ids().unwrap(), vec!["1", "2"]);
        assert_eq!(client.cache().len(), 3);
    }

    #[tokio::test]
    async fn delete_removes_from_both_views() {
        let (_service, client) = seeded();
        client.list().await.unwrap();

        let deleted = client.delete("1").await.unwrap();

        assert_eq!(deleted.id, "1");
        assert_eq!(client.cached_ids().unwrap(), vec!["2"]);
        assert!(client.cached_todo("1").is_none());
        assert!(client.cached_todo("2").is_some());
    }

    #[tokio::test]
    async fn failed_delete_leaves_cache_untouched() {
        let (service, client) = seeded();
        client.list().await.unwrap();
        service.fail_next(Operation::Delete);

        assert!(client.delete("1").await.unwrap_err().is_service());
        assert_eq!(client.cached_ids().unwrap(), vec!["1", "2"]);
        assert!(client.cached_todo("1").is_some());
    }

    #[tokio::test]
    async fn watchers_follow_list_changes() {
        let (_service, client) = seeded();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        let _sub = client.watch_ids(move |current, _previous| {
            log.lock().unwrap().push(current.clone().unwrap_or_default());
        });
        client.list().await.unwrap();
        client.create("c").await.unwrap();
        client.delete("1").await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                vec!["1".to_string(), "2".to_string()],
                vec!["1".to_string(), "2".to_string(), "3".to_string()],
                vec!["2".to_string(), "3".to_string()],
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gc_drops_unwatched_todos() {
        let (_service, client) = seeded();
        client.list().await.unwrap();
        let _sub = client.watch_todo("2", |_, _| {});

        let handle = client.spawn_gc(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.abort();

        assert!(client.cached_todo("1").is_none());
        assert!(client.cached_todo("2").is_some());
        assert!(client.cached_ids().is_none());
    }

    #[tokio::test]
    async fn delete_discards_list_fetch_started_before_it() {
        let (service, client) = seeded();
        client.list().await.unwrap();

        let ticket = client.cache().begin_fetch(&keys::list());
        let before = service.todos();
        client.delete("1").await.unwrap();

        let entries: Vec<_> = before
            .iter()
            .map(|t| (keys::detail(&t.id), TodoCacheValue::Record(t.clone())))
            .chain(std::iter::once((
                keys::list(),
                TodoCacheValue::Ids(before.iter().map(|t| t.id.clone()).collect()),
            )))
            .collect();
        assert!(!client.cache().complete_fetch(&ticket, entries));

        assert_eq!(client.cached_ids(), Some(vec!["2".to_string()]));
        assert!(client.cached_todo("1").is_none());
    }

    #[tokio::test]
    async fn create_discards_list_fetch_started_before_it() {
        let (_service, client) = seeded();
        client.list().await.unwrap();

        let ticket = client.cache().begin_fetch(&keys::list());
        let created = client.create("c").await.unwrap();
        let stale = TodoCacheValue::Ids(vec!["1".to_string(), "2".to_string()]);

        assert!(!client.cache().complete_fetch(&ticket, [(keys::list(), stale)]));
        assert_eq!(
            client.cached_ids(),
            Some(vec!["1".to_string(), "2".to_string(), created.id])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gc_keeps_records_of_a_watched_list() {
        let (service, client) = seeded();
        client.list().await.unwrap();
        let _sub = client.watch_ids(|_, _| {});

        let handle = client.spawn_gc(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(10)).await;
        handle.abort();

        assert_eq!(client.cached_ids(), Some(vec!["1".to_string(), "2".to_string()]));
        for id in ["1", "2"] {
            client.detail(id, DetailMode::CacheOnly).await.unwrap();
        }
        assert_eq!(service.calls(Operation::Get), 0);
    }
}
