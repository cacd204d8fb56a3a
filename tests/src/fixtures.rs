//! Shared setup for the integration scenarios.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use realm_client::{ClientConfig, InMemoryLedger, RealmSeed, RealmSession};
use shared_bus::{EventFilter, EventTopic, Notification, SessionEvent, Subscription};
use shared_types::Address;

/// Owner of the seeded realm.
pub const OWNER: Address = Address([0xaa; 20]);

/// A second wallet.
pub const OTHER: Address = Address([0xbb; 20]);

/// Ledger with `OWNER` connected and realm 7 ("Dragonkeep") owned by it.
pub fn seeded_ledger() -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_accounts(vec![OWNER]);
    ledger.seed_realm(7, RealmSeed::new("Dragonkeep", OWNER));
    ledger
}

/// Start a session on `ledger` with the testing config.
pub async fn start_session(ledger: &Arc<InMemoryLedger>) -> anyhow::Result<RealmSession> {
    crate::init_tracing();
    RealmSession::start(ClientConfig::for_testing(), ledger.clone(), ledger.clone())
        .await
        .context("session failed to start")
}

/// Subscribe to user notifications only.
pub fn notifications(session: &RealmSession) -> Subscription {
    session.subscribe(EventFilter::topics(vec![EventTopic::Notifications]))
}

/// Wait for the next notification.
pub async fn next_notification(sub: &mut Subscription) -> anyhow::Result<Notification> {
    match sub.recv().await {
        Some(SessionEvent::Notification(note)) => Ok(note),
        Some(other) => Err(anyhow!("expected a notification, got {other:?}")),
        None => Err(anyhow!("event bus closed")),
    }
}
