//! # Workflow Flows
//!
//! Mint, terraform and the single-shot actions, end to end: user input,
//! ledger write, confirmation, notification and cache refresh.

#[cfg(test)]
mod tests {
    use realm_client::adapters::TERRAFORM_COOLDOWN_S;
    use realm_client::{
        ActionKind, EntityValue, FormState, TerraformEligibility, UNKNOWN_ERROR_MESSAGE,
    };
    use shared_bus::Severity;

    use crate::fixtures::{next_notification, notifications, seeded_ledger, start_session, OWNER};

    #[tokio::test(start_paused = true)]
    async fn test_rejected_mint_returns_to_valid() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut notes = notifications(&session);
        let mint = session.mint();

        mint.set_id("42").await?;
        mint.set_name("Foo").await?;
        mint.wait_for(|s| s.state == FormState::Valid).await?;

        ledger.reject_next_write("MetaMask Tx Signature: User denied transaction signature.");
        mint.submit().await?;

        let note = next_notification(&mut notes).await?;
        assert_eq!(note.severity, Severity::Error);
        assert_eq!(note.title, "Error");
        assert_eq!(
            note.description.as_deref(),
            Some("MetaMask Tx Signature: User denied transaction signature.")
        );

        let snapshot = mint.wait_for(|s| s.state == FormState::Valid).await?;
        assert_eq!((snapshot.id.as_str(), snapshot.name.as_str()), ("42", "Foo"));
        assert!(notes.drain().is_empty());
        assert!(ledger.realm(42).is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_mint_success_then_reset() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut notes = notifications(&session);
        let mut supply = session.total_supply();
        supply.settled().await?;

        let mint = session.mint();
        mint.set_id("42").await?;
        mint.set_name("Foo").await?;
        mint.wait_for(|s| s.state == FormState::Valid).await?;
        mint.submit().await?;

        let done = mint.wait_for(|s| s.state == FormState::Success).await?;
        assert!(done.last_tx.is_some());
        assert_eq!(next_notification(&mut notes).await?.title, "Realm Created");
        assert_eq!(ledger.realm(42).map(|r| r.owner), Some(OWNER));
        supply
            .wait_for(|s| s.value().and_then(EntityValue::as_token_count) == Some(2))
            .await?;

        mint.reset().await?;
        let cleared = mint.wait_for(|s| s.state == FormState::Invalid).await?;
        assert!(cleared.id.is_empty());
        assert!(cleared.name.is_empty());
        assert_eq!(cleared.last_tx, None);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_terraform_refreshes_realm_and_timers() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut notes = notifications(&session);
        let mut realm = session.realm("7");
        realm.settled().await?;

        let terraform = session.terraform("7")?;
        terraform.wait_for(|s| s.can_terraform).await?;
        let realm_reads = ledger.read_count("getRealm");

        terraform.terraform(1).await?;
        assert_eq!(
            next_notification(&mut notes).await?.title,
            "Realm terraformed successfully!"
        );

        let feature_ids = |s: &realm_client::EntrySnapshot| {
            s.value()
                .and_then(EntityValue::as_realm)
                .map(|r| r.features.iter().map(|f| f.feature_id).collect::<Vec<_>>())
        };
        let snapshot = realm
            .wait_for(|s| !s.is_fetching && feature_ids(s) == Some(vec![0, 4, 2]))
            .await?;
        assert!(!snapshot.is_stale);
        assert!(ledger.read_count("getRealm") > realm_reads);

        let after = terraform
            .wait_for(|s| s.eligibility == TerraformEligibility::No)
            .await?;
        assert!(!after.can_terraform);

        ledger.advance_clock_ms((TERRAFORM_COOLDOWN_S + 1) * 1000);
        session.refresh_clock();
        terraform.wait_for(|s| s.can_terraform).await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_closes_its_own_eligibility() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut notes = notifications(&session);

        let eligibility = session.eligibility("7").await?;
        let queue = session.queue_eligibility("7").await?;
        let collect = session.action("7", ActionKind::Collect)?;
        collect
            .submit(ActionKind::Collect.is_eligible(&eligibility, &queue))
            .await?;
        assert_eq!(
            next_notification(&mut notes).await?.title,
            "Collected resources successfully!"
        );

        let eligibility = session.eligibility("7").await?;
        assert!(!eligibility.can_collect);
        assert!(eligibility.can_terraform);
        let countdown = session.countdown("7").await?;
        assert!(countdown.map_or(false, |c| c.collect_in_ms > 0));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_noisy_provider_error_is_generic() -> anyhow::Result<()> {
        let ledger = seeded_ledger();
        let session = start_session(&ledger).await?;
        let mut notes = notifications(&session);

        ledger.reject_next_write(
            "could not detect network (event=\"noNetwork\", code=NETWORK_ERROR, version=providers/5.4.5)",
        );
        let farm = session.action("7", ActionKind::BuildFarm)?;
        assert!(farm.submit(true).await.is_err());

        let note = next_notification(&mut notes).await?;
        assert_eq!(note.title, "Farm Build Error");
        assert_eq!(note.description.as_deref(), Some(UNKNOWN_ERROR_MESSAGE));
        Ok(())
    }
}
