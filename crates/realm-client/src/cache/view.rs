//! Subscriber handle onto one cache entry.

use tokio::sync::watch;

use super::entry::{EntrySnapshot, EntryStatus};
use super::store::EntityCache;
use crate::domain::{CacheKey, ClientError, EntityValue};

/// A live subscription to a cache entry.
///
/// Holding a view keeps the entry from eviction. Views opened with fetching
/// enabled also make invalidations refetch it. Dropping the view releases the
/// subscription.
pub struct CacheView {
    key: CacheKey,
    receiver: watch::Receiver<EntrySnapshot>,
    cache: EntityCache,
    epoch: u64,
    enabled: bool,
}

impl CacheView {
    pub(crate) fn new(
        key: CacheKey,
        receiver: watch::Receiver<EntrySnapshot>,
        cache: EntityCache,
        epoch: u64,
        enabled: bool,
    ) -> Self {
        Self {
            key,
            receiver,
            cache,
            epoch,
            enabled,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> EntrySnapshot {
        self.receiver.borrow().clone()
    }

    pub fn status(&self) -> EntryStatus {
        self.receiver.borrow().status.clone()
    }

    /// Latest successful value, kept visible during refetches.
    pub fn value(&self) -> Option<EntityValue> {
        self.receiver.borrow().value().cloned()
    }

    /// Whether the cache was cleared under this view.
    pub fn is_detached(&self) -> bool {
        self.receiver.has_changed().is_err()
    }

    /// Wait for the next change.
    pub async fn changed(&mut self) -> Result<(), ClientError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| ClientError::Detached(self.key.to_string()))
    }

    /// Wait until no fetch is running and return that snapshot.
    pub async fn settled(&mut self) -> Result<EntrySnapshot, ClientError> {
        self.wait_for(|snapshot| !snapshot.is_fetching).await
    }

    /// Wait until `predicate` holds.
    pub async fn wait_for<F>(&mut self, predicate: F) -> Result<EntrySnapshot, ClientError>
    where
        F: FnMut(&EntrySnapshot) -> bool,
    {
        match self.receiver.wait_for(predicate).await {
            Ok(snapshot) => Ok(snapshot.clone()),
            Err(_) => Err(ClientError::Detached(self.key.to_string())),
        }
    }
}

impl Drop for CacheView {
    fn drop(&mut self) {
        self.cache.release(&self.key, self.epoch, self.enabled);
    }
}

impl std::fmt::Debug for CacheView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheView")
            .field("key", &self.key)
            .field("snapshot", &*self.receiver.borrow())
            .finish()
    }
}
