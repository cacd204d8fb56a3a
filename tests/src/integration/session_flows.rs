//! # Session Flows
//!
//! Wallet and ledger signals entering through `SignalHandle` and their effect
//! on the shared cache.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use realm_client::{CacheKey, EntityValue};
    use shared_bus::{EventFilter, EventTopic, SessionEvent};
    use shared_types::Address;

    use crate::fixtures::{seeded_ledger, start_session, OTHER, OWNER};

    #[tokio::test(start_paused = true)]
    async fn test_account_change_discards_late_fetches() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut wallet = session.subscribe(EventFilter::topics(vec![EventTopic::Wallet]));

        ledger.set_read_delay(Duration::from_millis(100));
        let timers = session.timers("7");
        assert!(timers.snapshot().is_fetching);

        session.signals().account_changed(Some(OTHER)).await?;
        assert!(matches!(
            wallet.recv().await,
            Some(SessionEvent::AccountChanged { account: Some(a) }) if a == OTHER
        ));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(timers.is_detached());
        assert!(session.cache().peek(&CacheKey::realm_timers("7")).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_disconnect_disables_realm_reads() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut wallet = session.subscribe(EventFilter::topics(vec![EventTopic::Wallet]));

        session.signals().account_changed(None).await?;
        wallet.recv().await;

        let reads = ledger.read_count("getRealm");
        let mut realm = session.realm("7");
        let snapshot = realm.settled().await?;
        assert!(snapshot.value().is_none());
        assert_eq!(ledger.read_count("getRealm"), reads);
        assert!(session.owner("7").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_chain_change_refetches_on_next_read() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut network = session.subscribe(EventFilter::topics(vec![EventTopic::Network]));

        let mut realm = session.realm("7");
        realm.settled().await?;
        let reads = ledger.read_count("getRealm");

        session.signals().chain_changed("0xa4b1").await?;
        network.recv().await;
        assert!(realm.is_detached());
        assert!(session.cache().is_empty());

        let mut reopened = session.realm("7");
        let snapshot = reopened.settled().await?;
        assert_eq!(ledger.read_count("getRealm"), reads + 1);
        let name = snapshot
            .value()
            .and_then(EntityValue::as_realm)
            .map(|r| r.name.clone());
        assert_eq!(name.as_deref(), Some("Dragonkeep"));
        Ok(())
    }

    #[tokio::test]
    async fn test_realm_created_event_refreshes_supply() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut supply = session.total_supply();
        supply.settled().await?;

        ledger.seed_realm(8, realm_client::RealmSeed::new("Oslo", OTHER));
        session.signals().realm_created("8").await?;
        let snapshot = supply
            .wait_for(|s| s.value().and_then(EntityValue::as_token_count) == Some(2))
            .await?;
        assert!(!snapshot.is_stale);
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_wallet_switches_account() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        ledger.lock_wallet(vec![OWNER, OTHER]);
        let session = start_session(&ledger).await?;
        assert_eq!(session.account(), None);

        let connected: Option<Address> = session.connect_wallet().await?;
        assert_eq!(connected, Some(OWNER));
        assert_eq!(session.scope(), 1);

        let mut owner = session
            .owner("7")
            .ok_or_else(|| anyhow::anyhow!("owner view missing after connect"))?;
        let snapshot = owner.settled().await?;
        assert_eq!(snapshot.value().and_then(EntityValue::as_owner), Some(true));
        Ok(())
    }
}
