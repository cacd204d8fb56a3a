//! # Cache Flows
//!
//! Read coalescing, lazy invalidation, display-name recovery and the
//! monotonic block clock, observed through a running session.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use realm_client::cache::fetcher;
    use realm_client::{CacheKey, EntityCache, EntityValue, KeyFilter, LedgerError};
    use shared_types::Contract;

    use crate::fixtures::{seeded_ledger, start_session};

    fn counting_fetcher(calls: &Arc<AtomicUsize>) -> realm_client::cache::Fetcher {
        let calls = calls.clone();
        fetcher(move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u64;
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(EntityValue::TokenCount(n + 1))
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_gets_share_one_fetch() {
        let cache = EntityCache::new(16);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut first = cache.get(CacheKey::realm("7"), counting_fetcher(&calls), true);
        let mut second = cache.get(CacheKey::realm("7"), counting_fetcher(&calls), true);
        let (a, b) = futures::future::join(first.settled(), second.settled()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().value(), b.unwrap().value());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_refetches_only_observed_keys() {
        let cache = EntityCache::new(16);
        let observed = Arc::new(AtomicUsize::new(0));
        let unobserved = Arc::new(AtomicUsize::new(0));

        let mut view = cache.get(CacheKey::realm("7"), counting_fetcher(&observed), true);
        view.settled().await.unwrap();
        let dropped = cache.get(CacheKey::realm("8"), counting_fetcher(&unobserved), true);
        drop(dropped);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.invalidate(KeyFilter::exact([CacheKey::realm("7")])), 1);
        assert_eq!(cache.invalidate(KeyFilter::exact([CacheKey::realm("8")])), 0);
        let snapshot = view.wait_for(|s| !s.is_fetching && !s.is_stale).await.unwrap();

        assert_eq!(observed.load(Ordering::SeqCst), 2);
        assert_eq!(unobserved.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.value(), Some(&EntityValue::TokenCount(2)));
        assert!(cache.peek(&CacheKey::realm("8")).map_or(false, |s| s.is_stale));
    }

    #[tokio::test]
    async fn test_reverted_name_read_is_recovered() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;

        ledger.fail_read(
            "getName",
            LedgerError::ReadFailure {
                contract: Contract::Realm,
                method: "getName".into(),
                reason: "execution reverted".into(),
                revert_data: Some(b"Dragon\xffKeep".to_vec()),
            },
        );
        let mut name = session.realm_name("7");
        let snapshot = name.settled().await?;
        assert_eq!(snapshot.value().and_then(EntityValue::as_realm_name), Some("DragonKeep"));

        ledger.fail_read(
            "getName",
            LedgerError::ReadFailure {
                contract: Contract::Realm,
                method: "getName".into(),
                reason: "execution reverted".into(),
                revert_data: None,
            },
        );
        let mut other = session.realm_name("8");
        let snapshot = other.settled().await?;
        assert_eq!(snapshot.value().and_then(EntityValue::as_realm_name), Some("Unknown"));
        Ok(())
    }

    #[tokio::test]
    async fn test_block_clock_never_goes_back() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        ledger.set_clock_ms(1_800_000_000_000);

        let mut clock = session.block_timestamp();
        clock.settled().await?;

        ledger.set_clock_ms(1_700_000_000_000);
        session.refresh_clock();
        let snapshot = clock.wait_for(|s| !s.is_fetching && !s.is_stale).await?;
        assert_eq!(
            snapshot.value().and_then(EntityValue::as_block_timestamp),
            Some(1_800_000_000_000)
        );

        ledger.advance_clock_ms(200_000_000_000);
        session.refresh_clock();
        let snapshot = clock.wait_for(|s| !s.is_fetching && !s.is_stale).await?;
        assert_eq!(
            snapshot.value().and_then(EntityValue::as_block_timestamp),
            Some(1_900_000_000_000)
        );
        Ok(())
    }
}
