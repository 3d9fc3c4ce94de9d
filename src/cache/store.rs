//! In-memory query cache
//!
//! A `CacheStore` maps `QueryKey`s to values plus the metadata the query
//! layer needs: when the value was last written, whether it was marked
//! stale, which fetch (if any) is in flight, and who is watching it.
//!
//! The store is a cheap-to-clone handle over shared state. Every operation
//! takes the lock for a short synchronous section and never across an
//! `.await`; subscriber callbacks run after the lock is released.

use super::key::QueryKey;
use super::subscription::{deliver, selecting, Notification, Subscriber, Subscription};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

struct Entry<V> {
    value: Option<V>,
    updated_at: Option<Instant>,
    invalidated: bool,
    /// Bumped by `begin_fetch`, `cancel` and `remove`; a fetch may only
    /// publish while its ticket still matches.
    generation: u64,
    fetching: bool,
    /// Store-wide sequence number of the last write to this entry
    write_seq: u64,
    last_active: Instant,
    subscribers: Vec<Subscriber<V>>,
}

impl<V> Entry<V> {
    fn new(now: Instant) -> Self {
        Self {
            value: None,
            updated_at: None,
            invalidated: false,
            generation: 0,
            fetching: false,
            write_seq: 0,
            last_active: now,
            subscribers: Vec::new(),
        }
    }
}

pub(crate) struct Inner<V> {
    entries: HashMap<QueryKey, Entry<V>>,
    next_subscriber: u64,
    write_seq: u64,
}

impl<V: Clone> Inner<V> {
    fn entry(&mut self, key: &QueryKey) -> &mut Entry<V> {
        let now = Instant::now();
        self.entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now))
    }

    /// Store a value and return the notification it owes its subscribers
    fn put(&mut self, key: &QueryKey, value: V) -> Option<Notification<V>> {
        self.write_seq += 1;
        let seq = self.write_seq;
        let now = Instant::now();

        let entry = self.entry(key);
        entry.value = Some(value);
        entry.updated_at = Some(now);
        entry.invalidated = false;
        entry.write_seq = seq;
        entry.last_active = now;

        notification_for(entry)
    }
}

impl<V> Inner<V> {
    pub(crate) fn detach(&mut self, key: &QueryKey, id: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.subscribers.retain(|s| s.id != id);
            entry.last_active = Instant::now();
        }
    }
}

fn notification_for<V: Clone>(entry: &Entry<V>) -> Option<Notification<V>> {
    if entry.subscribers.is_empty() {
        return None;
    }
    Some(Notification {
        listeners: entry.subscribers.iter().map(|s| s.listener.clone()).collect(),
        value: entry.value.clone(),
    })
}

/// Proof that a fetch was started for a key
///
/// Hand it back to `complete_fetch` with the response; the response is
/// published only if nothing cancelled or superseded the fetch meanwhile.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
    started_seq: u64,
}

/// Cache operations applied as one unit, see `CacheStore::batch`
pub struct Batch<'a, V> {
    inner: &'a mut Inner<V>,
    notifications: Vec<Notification<V>>,
}

impl<V: Clone> Batch<'_, V> {
    pub fn read(&self, key: &QueryKey) -> Option<&V> {
        self.inner.entries.get(key).and_then(|e| e.value.as_ref())
    }

    pub fn write(&mut self, key: &QueryKey, value: V) {
        trace!("cache write {}", key);
        self.notifications.extend(self.inner.put(key, value));
    }

    pub fn update<F>(&mut self, key: &QueryKey, f: F) -> bool
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match f(self.read(key)) {
            Some(next) => {
                self.write(key, next);
                true
            }
            None => false,
        }
    }

    /// Discard the response of any fetch in flight for `key`
    pub fn cancel(&mut self, key: &QueryKey) {
        if let Some(entry) = self.inner.entries.get_mut(key) {
            entry.generation += 1;
            entry.fetching = false;
        }
    }

    pub fn remove(&mut self, key: &QueryKey) -> Option<V> {
        let removed = self.inner.entries.remove(key)?;
        debug!("removed {}", key);
        removed.value
    }
}

/// Shared key-value cache with freshness tracking and subscriptions
pub struct CacheStore<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Send + 'static> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + 'static> CacheStore<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                next_subscriber: 0,
                write_seq: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value for `key`
    pub fn read(&self, key: &QueryKey) -> Option<V> {
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(key)?;
        entry.last_active = Instant::now();
        entry.value.clone()
    }

    /// Whether a value is stored under `key`
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.value.is_some())
    }

    /// Replace the value, mark it fresh and notify subscribers
    pub fn write(&self, key: &QueryKey, value: V) {
        let notification = self.lock().put(key, value);
        trace!("cache write {}", key);
        deliver(notification.into_iter().collect());
    }

    /// Write several keys as one atomic publish
    ///
    /// No reader can observe some of the writes without the others; all
    /// subscribers are notified after the last value is in place.
    pub fn write_many(&self, entries: impl IntoIterator<Item = (QueryKey, V)>) {
        self.batch(|tx| {
            for (key, value) in entries {
                tx.write(&key, value);
            }
        });
    }

    /// Derive the next value from the current one
    ///
    /// Returning `None` leaves the entry untouched. Returns whether a value
    /// was written.
    pub fn update<F>(&self, key: &QueryKey, f: F) -> bool
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        self.batch(|tx| tx.update(key, f))
    }

    /// Run several reads and writes under one lock
    ///
    /// Readers see either none or all of the batch's writes; subscribers
    /// are notified once the batch is done.
    pub fn batch<R>(&self, f: impl FnOnce(&mut Batch<'_, V>) -> R) -> R {
        let (result, notifications) = {
            let mut inner = self.lock();
            let mut batch = Batch {
                inner: &mut *inner,
                notifications: Vec::new(),
            };
            let result = f(&mut batch);
            (result, batch.notifications)
        };
        deliver(notifications);
        result
    }

    /// Mark an entry stale without dropping its value
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(entry) = self.lock().entries.get_mut(key) {
            entry.invalidated = true;
            debug!("invalidated {}", key);
        }
    }

    /// Mark every entry under `prefix` stale; returns how many were marked
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        let mut inner = self.lock();
        let mut marked = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                marked += 1;
            }
        }
        debug!("invalidated {} entries under {}", marked, prefix);
        marked
    }

    /// Delete the entry, its subscriptions and any in-flight fetch claim
    pub fn remove(&self, key: &QueryKey) -> Option<V> {
        let removed = self.lock().entries.remove(key);
        if removed.is_some() {
            debug!("removed {}", key);
        }
        removed.and_then(|entry| entry.value)
    }

    /// Whether a read should trigger a refetch
    ///
    /// Missing values, invalidated entries and values older than
    /// `stale_time` are stale.
    pub fn is_stale(&self, key: &QueryKey, stale_time: Duration) -> bool {
        let inner = self.lock();
        match inner.entries.get(key) {
            Some(Entry {
                value: Some(_),
                updated_at: Some(updated_at),
                invalidated: false,
                ..
            }) => updated_at.elapsed() >= stale_time,
            _ => true,
        }
    }

    /// Watch the projection `selector` of the value under `key`
    ///
    /// `listener` receives `(current, previous)` whenever the projection
    /// changes. Listeners must not write to the key they observe.
    pub fn subscribe<S, F, L>(&self, key: &QueryKey, selector: F, listener: L) -> Subscription<V>
    where
        S: PartialEq + Send + 'static,
        F: Fn(Option<&V>) -> S + Send + 'static,
        L: FnMut(&S, &S) + Send + 'static,
    {
        let mut inner = self.lock();
        inner.next_subscriber += 1;
        let id = inner.next_subscriber;

        let entry = inner.entry(key);
        let initial = selector(entry.value.as_ref());
        entry.subscribers.push(Subscriber {
            id,
            listener: selecting(initial, selector, listener),
        });
        entry.last_active = Instant::now();

        Subscription {
            store: Arc::downgrade(&self.inner),
            key: key.clone(),
            id,
        }
    }

    /// Number of live subscriptions on `key`
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.lock()
            .entries
            .get(key)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Claim `key` for a new fetch, superseding any fetch already in flight
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchTicket {
        let mut inner = self.lock();
        let started_seq = inner.write_seq;
        let entry = inner.entry(key);
        entry.generation += 1;
        entry.fetching = true;
        entry.last_active = Instant::now();

        FetchTicket {
            key: key.clone(),
            generation: entry.generation,
            started_seq,
        }
    }

    /// Cancel the in-flight fetch for `key`, if any
    ///
    /// The fetch's eventual response is discarded. Other keys are untouched.
    pub fn cancel(&self, key: &QueryKey) {
        if self.is_fetching(key) {
            debug!("cancelled in-flight fetch for {}", key);
        }
        self.batch(|tx| tx.cancel(key));
    }

    /// Whether a fetch for `key` is in flight
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.fetching)
    }

    /// Publish a fetch response
    ///
    /// `entries` is written atomically as with `write_many`. Returns `false`
    /// and writes nothing if the ticket was cancelled or superseded. Entries
    /// other than the ticket's own key that were written after the fetch
    /// began keep their newer value.
    pub fn complete_fetch(
        &self,
        ticket: &FetchTicket,
        entries: impl IntoIterator<Item = (QueryKey, V)>,
    ) -> bool {
        let notifications: Vec<_> = {
            let mut inner = self.lock();
            let current = inner
                .entries
                .get(&ticket.key)
                .is_some_and(|entry| entry.fetching && entry.generation == ticket.generation);
            if !current {
                debug!("discarded stale response for {}", ticket.key);
                return false;
            }

            let mut notifications = Vec::new();
            for (key, value) in entries {
                let newer = key != ticket.key
                    && inner
                        .entries
                        .get(&key)
                        .is_some_and(|entry| entry.write_seq > ticket.started_seq);
                if newer {
                    debug!("kept local write for {} over fetched value", key);
                    continue;
                }
                notifications.extend(inner.put(&key, value));
            }
            inner.entry(&ticket.key).fetching = false;
            notifications
        };
        deliver(notifications);
        true
    }

    /// Release a fetch claim without publishing (the fetch failed)
    pub fn fail_fetch(&self, ticket: &FetchTicket) {
        if let Some(entry) = self.lock().entries.get_mut(&ticket.key) {
            if entry.generation == ticket.generation {
                entry.fetching = false;
            }
        }
    }

    /// Evict entries nobody watches that have been idle for `gc_time`
    ///
    /// Entries with a fetch in flight are never evicted. Returns the number
    /// of evicted entries.
    pub fn collect_garbage(&self, gc_time: Duration) -> usize {
        self.collect_garbage_linked(gc_time, |_| Vec::new())
    }

    /// Like `collect_garbage`, but an entry that survives also keeps alive
    /// every key `links` returns for its value, transitively.
    pub fn collect_garbage_linked<L>(&self, gc_time: Duration, links: L) -> usize
    where
        L: Fn(&V) -> Vec<QueryKey>,
    {
        let mut inner = self.lock();

        let mut keep: HashSet<QueryKey> = HashSet::new();
        let mut pending: Vec<QueryKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| {
                !entry.subscribers.is_empty()
                    || entry.fetching
                    || entry.last_active.elapsed() < gc_time
            })
            .map(|(key, _)| key.clone())
            .collect();
        while let Some(key) = pending.pop() {
            if !keep.insert(key.clone()) {
                continue;
            }
            if let Some(value) = inner.entries.get(&key).and_then(|e| e.value.as_ref()) {
                pending.extend(links(value).into_iter().filter(|k| !keep.contains(k)));
            }
        }

        let before = inner.entries.len();
        inner.entries.retain(|key, _| keep.contains(key));
        let evicted = before - inner.entries.len();
        if evicted > 0 {
            debug!("garbage collected {} cache entries", evicted);
        }
        evicted
    }

    /// Number of entries holding a value
    pub fn len(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
