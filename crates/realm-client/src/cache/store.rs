//! # Entity Cache
//!
//! Read-through cache keyed by [`CacheKey`].
//!
//! ## Rules
//!
//! - At most one fetch per key is in flight; concurrent `get`s share it.
//! - Invalidation marks entries stale and refetches only those with live
//!   enabled views; disabled views wait for the next enabled `get`. A key invalidated mid-fetch is refetched once the current fetch
//!   resolves, so a write is never masked by a read that started before it.
//! - `clear` drops everything; fetches started before it resolve into the
//!   void.
//! - Entries without views are evicted least-recently-used first once the
//!   cache holds more than `capacity` keys.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::entry::{Entry, EntrySnapshot, EntryStatus, FetchResult, Fetcher};
use super::view::CacheView;
use crate::domain::{CacheKey, EntityValue, KeyFilter};

/// Shared, cloneable handle to the cache.
#[derive(Clone)]
pub struct EntityCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    entries: Mutex<LruCache<CacheKey, Entry>>,
    capacity: usize,
    epoch: AtomicU64,
    fetches_started: AtomicU64,
}

impl EntityCache {
    /// Create a cache that keeps at most `capacity` unobserved entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(LruCache::unbounded()),
                capacity: capacity.max(1),
                epoch: AtomicU64::new(0),
                fetches_started: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to `key`, fetching it when `enabled` and not already fresh.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn get(&self, key: CacheKey, fetcher: Fetcher, enabled: bool) -> CacheView {
        let mut entries = self.inner.entries.lock();
        let epoch = self.inner.epoch.load(Ordering::Acquire);

        let entry = entries.get_or_insert_mut(key.clone(), || Entry::new(epoch));
        entry.subscribers += 1;
        if enabled {
            entry.enabled_subscribers += 1;
        }
        entry.fetcher = Some(fetcher.clone());
        if enabled && entry.needs_fetch() {
            self.begin_fetch(entry, &key, fetcher);
        }
        let receiver = entry.tx.subscribe();

        self.evict_excess(&mut entries);
        drop(entries);

        CacheView::new(key, receiver, self.clone(), epoch, enabled)
    }

    /// Load `key` without subscribing. Resolves once the fetch settles;
    /// failures stay in the entry and are not returned.
    pub async fn prefetch(&self, key: CacheKey, fetcher: Fetcher) {
        let mut receiver = {
            let mut entries = self.inner.entries.lock();
            let epoch = self.inner.epoch.load(Ordering::Acquire);
            let entry = entries.get_or_insert_mut(key.clone(), || Entry::new(epoch));
            if entry.fetcher.is_none() {
                entry.fetcher = Some(fetcher.clone());
            }
            if entry.needs_fetch() {
                self.begin_fetch(entry, &key, fetcher);
            }
            let receiver = entry.tx.subscribe();
            self.evict_excess(&mut entries);
            receiver
        };

        // A closed channel means the entry was cleared; nothing to wait for.
        let _ = receiver.wait_for(|snapshot| !snapshot.is_fetching).await;
    }

    /// Mark matching entries stale and refetch the observed ones.
    ///
    /// Returns the number of refetches scheduled, deferred ones included.
    pub fn invalidate(&self, filter: KeyFilter) -> usize {
        let mut entries = self.inner.entries.lock();
        let mut scheduled = 0;

        for (key, entry) in entries.iter_mut() {
            if !filter.matches(key) {
                continue;
            }
            entry.stale = true;

            if entry.in_flight {
                entry.refetch_queued = true;
                entry.publish();
                if entry.wants_refetch() {
                    scheduled += 1;
                }
                continue;
            }

            match entry.fetcher.clone() {
                Some(fetcher) if entry.wants_refetch() => {
                    self.begin_fetch(entry, key, fetcher);
                    scheduled += 1;
                }
                _ => entry.publish(),
            }
        }

        debug!(?filter, scheduled, "Cache invalidated");
        scheduled
    }

    /// Current snapshot of `key`, without touching recency.
    pub fn peek(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        self.inner.entries.lock().peek(key).map(Entry::snapshot)
    }

    /// Latest successful value of `key`.
    pub fn peek_value(&self, key: &CacheKey) -> Option<EntityValue> {
        self.peek(key).and_then(|s| s.value().cloned())
    }

    /// Drop every entry. Open views are detached.
    pub fn clear(&self) {
        let mut entries = self.inner.entries.lock();
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "Cache cleared");
    }

    /// Live views on `key`.
    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.inner
            .entries
            .lock()
            .peek(key)
            .map_or(0, |entry| entry.subscribers)
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total fetches started since creation.
    pub fn fetches_started(&self) -> u64 {
        self.inner.fetches_started.load(Ordering::Relaxed)
    }

    pub(crate) fn release(&self, key: &CacheKey, epoch: u64, enabled: bool) {
        let mut entries = self.inner.entries.lock();
        if let Some(entry) = entries.peek_mut(key) {
            if entry.epoch == epoch {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                if enabled {
                    entry.enabled_subscribers = entry.enabled_subscribers.saturating_sub(1);
                }
            }
        }
        self.evict_excess(&mut entries);
    }

    fn begin_fetch(&self, entry: &mut Entry, key: &CacheKey, fetcher: Fetcher) {
        entry.in_flight = true;
        entry.refetch_queued = false;
        if !matches!(entry.status, EntryStatus::Success(_)) {
            entry.status = EntryStatus::Loading;
        }
        entry.publish();
        self.inner.fetches_started.fetch_add(1, Ordering::Relaxed);
        trace!(%key, "Fetch started");

        let cache = self.clone();
        let key = key.clone();
        let epoch = entry.epoch;
        tokio::spawn(async move {
            let result = fetcher().await;
            cache.resolve(&key, epoch, result);
        });
    }

    fn resolve(&self, key: &CacheKey, epoch: u64, result: FetchResult) {
        let mut entries = self.inner.entries.lock();
        let Some(entry) = entries.peek_mut(key) else {
            debug!(%key, "Discarding fetch for dropped entry");
            return;
        };
        if entry.epoch != epoch {
            debug!(%key, "Discarding fetch from before clear");
            return;
        }

        entry.in_flight = false;
        entry.version += 1;
        match result {
            Ok(value) => {
                trace!(%key, kind = value.kind(), "Fetch succeeded");
                entry.status = EntryStatus::Success(value);
            }
            Err(error) => {
                debug!(%key, %error, "Fetch failed");
                entry.status = EntryStatus::Error(error);
            }
        }

        let requeue = std::mem::take(&mut entry.refetch_queued);
        entry.stale = requeue;

        match entry.fetcher.clone() {
            Some(fetcher) if requeue && entry.wants_refetch() => {
                // Publish the resolved value first so views see it before
                // the deferred refetch flips `is_fetching` back on.
                entry.publish();
                self.begin_fetch(entry, key, fetcher);
            }
            _ => entry.publish(),
        }

        self.evict_excess(&mut entries);
    }

    fn evict_excess(&self, entries: &mut LruCache<CacheKey, Entry>) {
        while entries.len() > self.inner.capacity {
            let victim = entries
                .iter()
                .rev()
                .find(|(_, entry)| entry.is_evictable())
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    trace!(%key, "Evicting cache entry");
                    entries.pop(&key);
                }
                None => break,
            }
        }
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("entries", &self.len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}
