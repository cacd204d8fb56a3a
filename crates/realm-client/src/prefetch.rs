//! Warm the cache on user intent, before the realm page is opened.

use shared_types::RealmId;
use tracing::debug;

use crate::queries::RealmQueries;

/// Intent-driven prefetcher.
#[derive(Clone)]
pub struct Prefetcher {
    queries: RealmQueries,
}

impl Prefetcher {
    pub fn new(queries: RealmQueries) -> Self {
        Self { queries }
    }

    /// Pointer hovered a realm link.
    pub async fn on_hover(&self, raw_id: &str) {
        self.prefetch_realm(raw_id).await;
    }

    /// Keyboard confirm in the realm search box.
    pub async fn on_confirm(&self, raw_id: &str) {
        self.prefetch_realm(raw_id).await;
    }

    /// Load name, entity, resources and timers for `raw_id`.
    ///
    /// Empty or non-numeric ids are a silent no-op. Fetch failures stay in
    /// their cache entries.
    pub async fn prefetch_realm(&self, raw_id: &str) {
        let raw_id = raw_id.trim();
        if raw_id.is_empty() {
            return;
        }
        let id = match RealmId::parse(raw_id) {
            Ok(id) => id,
            Err(e) => {
                debug!(raw_id, error = %e, "Skipping prefetch");
                return;
            }
        };
        debug!(realm_id = %id, "Prefetching realm");
        self.queries.prefetch_realm(&id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use shared_types::Address;
    use tokio::sync::watch;

    use crate::adapters::{InMemoryLedger, RealmSeed};
    use crate::cache::EntityCache;
    use crate::domain::{BlockClock, CacheKey, EntityValue};

    fn setup() -> (Arc<InMemoryLedger>, EntityCache, Prefetcher) {
        let owner = Address([0xaa; 20]);
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_accounts(vec![owner]);
        ledger.seed_realm(7, RealmSeed::new("Dragonkeep", owner));
        let (_tx, rx) = watch::channel(Some(owner));
        let cache = EntityCache::new(64);
        let queries = RealmQueries::new(cache.clone(), ledger.clone(), Arc::new(BlockClock::new()), rx);
        (ledger, cache, Prefetcher::new(queries))
    }

    #[tokio::test]
    async fn test_hover_warms_four_keys() {
        let (_ledger, cache, prefetcher) = setup();
        prefetcher.on_hover(" 7 ").await;

        assert_eq!(
            cache.peek_value(&CacheKey::realm_name("7")),
            Some(EntityValue::RealmName("Dragonkeep".into()))
        );
        assert!(cache.peek_value(&CacheKey::realm("7")).is_some());
        assert!(cache.peek_value(&CacheKey::realm_resources("7")).is_some());
        assert!(cache.peek_value(&CacheKey::realm_timers("7")).is_some());
        assert_eq!(cache.len(), 4);
    }

    #[tokio::test]
    async fn test_bad_ids_are_a_no_op() {
        let (ledger, cache, prefetcher) = setup();
        prefetcher.on_confirm("   ").await;
        prefetcher.on_confirm("abc").await;
        assert!(cache.is_empty());
        assert_eq!(ledger.read_count("getName"), 0);
    }

    #[tokio::test]
    async fn test_missing_realm_is_swallowed() {
        let (_ledger, cache, prefetcher) = setup();
        prefetcher.on_confirm("99").await;
        let snapshot = cache.peek(&CacheKey::realm("99")).unwrap();
        assert!(snapshot.error().is_some());
    }
}
