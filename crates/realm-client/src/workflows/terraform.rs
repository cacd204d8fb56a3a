//! # Terraform Workflow
//!
//! Per-realm actor with two independent regions, rendered together:
//!
//! ```text
//! ownership:    Unknown ──► Owner | Viewer            (once per account)
//! eligibility:  No ──► Yes ──► Pending ──► No          (confirmed)
//!                               └────────► Yes         (reverted)
//! ```
//!
//! The action is exposed only when the realm is owned by the connected
//! account and its terraform cooldown has passed.

use serde::{Deserialize, Serialize};
use shared_types::{Address, Contract, RealmId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::WorkflowContext;
use crate::cache::CacheView;
use crate::domain::{
    invariant_terraform_allowed, CacheKey, ClientError, EntityValue, FeatureSlot, KeyFilter,
};
use crate::ports::{LedgerValue, WriteCall};

const WORKFLOW: &str = "terraform";

/// Whether the connected account owns the realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    Unknown,
    Owner,
    Viewer,
}

/// Terraform eligibility region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerraformEligibility {
    No,
    Yes,
    /// Write in flight.
    Pending,
}

/// Inputs of the terraform machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerraformEvent {
    /// Ownership read resolved; `true` when the account owns the realm.
    OwnershipResolved(bool),
    /// The account changed; ownership must be read again.
    OwnershipReset,
    /// Eligibility evaluated against settled timers and the block clock.
    Evaluated(bool),
    Submit(FeatureSlot),
    Confirmed {
        attempt: u64,
        tx_hash: String,
    },
    Reverted {
        attempt: u64,
        error: ClientError,
    },
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerraformEffect {
    Write { attempt: u64, slot: FeatureSlot },
    Terraformed,
    Failed(ClientError),
}

/// Rendered state of the terraform workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformSnapshot {
    pub ownership: Ownership,
    pub eligibility: TerraformEligibility,
    /// Owner and eligible: the action is exposed.
    pub can_terraform: bool,
    pub last_tx: Option<String>,
}

/// Pure terraform state machine.
#[derive(Debug, Clone)]
pub struct TerraformMachine {
    ownership: Ownership,
    eligibility: TerraformEligibility,
    attempt: u64,
    last_tx: Option<String>,
}

impl Default for TerraformMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TerraformMachine {
    pub fn new() -> Self {
        Self {
            ownership: Ownership::Unknown,
            eligibility: TerraformEligibility::No,
            attempt: 0,
            last_tx: None,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn eligibility(&self) -> TerraformEligibility {
        self.eligibility
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn can_terraform(&self) -> bool {
        self.ownership == Ownership::Owner && self.eligibility == TerraformEligibility::Yes
    }

    pub fn snapshot(&self) -> TerraformSnapshot {
        TerraformSnapshot {
            ownership: self.ownership,
            eligibility: self.eligibility,
            can_terraform: self.can_terraform(),
            last_tx: self.last_tx.clone(),
        }
    }

    /// Apply one event.
    pub fn handle(&mut self, event: TerraformEvent) -> Vec<TerraformEffect> {
        use TerraformEligibility::*;

        match event {
            TerraformEvent::OwnershipResolved(owner) => {
                if self.ownership == Ownership::Unknown {
                    self.ownership = if owner {
                        Ownership::Owner
                    } else {
                        Ownership::Viewer
                    };
                }
                vec![]
            }
            TerraformEvent::OwnershipReset => {
                self.ownership = Ownership::Unknown;
                vec![]
            }
            TerraformEvent::Evaluated(allowed) => {
                match (self.eligibility, allowed) {
                    (No, true) => self.eligibility = Yes,
                    (Yes, false) => self.eligibility = No,
                    _ => {}
                }
                vec![]
            }
            TerraformEvent::Submit(slot) if self.can_terraform() => {
                self.attempt += 1;
                self.eligibility = Pending;
                vec![TerraformEffect::Write {
                    attempt: self.attempt,
                    slot,
                }]
            }
            TerraformEvent::Submit(_) => vec![],
            TerraformEvent::Confirmed { attempt, tx_hash }
                if self.eligibility == Pending && attempt == self.attempt =>
            {
                self.eligibility = No;
                self.last_tx = Some(tx_hash);
                vec![TerraformEffect::Terraformed]
            }
            TerraformEvent::Reverted { attempt, error }
                if self.eligibility == Pending && attempt == self.attempt =>
            {
                self.eligibility = Yes;
                vec![TerraformEffect::Failed(error)]
            }
            TerraformEvent::Confirmed { .. } | TerraformEvent::Reverted { .. } => vec![],
        }
    }
}

/// Handle to a running terraform actor.
pub struct TerraformWorkflow {
    realm_id: RealmId,
    tx: mpsc::Sender<TerraformEvent>,
    state: watch::Receiver<TerraformSnapshot>,
}

impl TerraformWorkflow {
    /// Start the actor for `realm_id` on the current runtime.
    pub fn spawn(ctx: WorkflowContext, realm_id: RealmId) -> Self {
        let (tx, rx) = mpsc::channel(ctx.config.command_buffer);
        let machine = TerraformMachine::new();
        let (state_tx, state_rx) = watch::channel(machine.snapshot());

        let actor = TerraformActor {
            views: Views::open(&ctx, &realm_id),
            ctx,
            realm_id: realm_id.clone(),
            machine,
            weak_tx: tx.downgrade(),
            state_tx,
        };
        tokio::spawn(actor.run(rx));

        Self {
            realm_id,
            tx,
            state: state_rx,
        }
    }

    pub fn realm_id(&self) -> &RealmId {
        &self.realm_id
    }

    /// Terraform feature `slot` (0, 1 or 2).
    pub async fn terraform(&self, slot: usize) -> Result<(), ClientError> {
        let slot = FeatureSlot::new(slot)?;
        if !self.state.borrow().can_terraform {
            return Err(ClientError::NotEligible { action: WORKFLOW });
        }
        self.tx
            .send(TerraformEvent::Submit(slot))
            .await
            .map_err(|_| ClientError::WorkflowClosed)
    }

    pub fn snapshot(&self) -> TerraformSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TerraformSnapshot> {
        self.state.clone()
    }

    /// Wait until the rendered state satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<TerraformSnapshot, ClientError>
    where
        F: FnMut(&TerraformSnapshot) -> bool,
    {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(predicate)
            .await
            .map_err(|_| ClientError::WorkflowClosed)?;
        Ok(snapshot.clone())
    }
}

/// The cache views eligibility is derived from.
struct Views {
    timers: CacheView,
    clock: CacheView,
    owner: Option<CacheView>,
}

impl Views {
    fn open(ctx: &WorkflowContext, realm_id: &RealmId) -> Self {
        let id = realm_id.as_str();
        Self {
            timers: ctx.queries.timers(id),
            clock: ctx.queries.block_timestamp(),
            owner: ctx.queries.owner(id),
        }
    }

    /// Events implied by the current view contents.
    fn derive(&self, account: Option<Address>) -> Vec<TerraformEvent> {
        let mut events = Vec::new();

        match &self.owner {
            Some(view) => {
                if let Some(owner) = view.value().and_then(|v| v.as_owner()) {
                    events.push(TerraformEvent::OwnershipResolved(owner));
                }
            }
            None if account.is_none() => events.push(TerraformEvent::OwnershipResolved(false)),
            None => {}
        }

        // Only settled timers count; a refetch after a confirmed write would
        // otherwise be judged on pre-write data.
        let timers = self.timers.snapshot();
        if !timers.is_fetching && !timers.is_stale {
            let terraform_time = timers
                .value()
                .and_then(EntityValue::as_timers)
                .map(|t| t.terraform_time);
            let now = self.clock.value().and_then(|v| v.as_block_timestamp());
            if let (Some(terraform_time), Some(now)) = (terraform_time, now) {
                events.push(TerraformEvent::Evaluated(invariant_terraform_allowed(
                    terraform_time,
                    now,
                )));
            }
        }
        events
    }
}

async fn view_changed(view: &mut CacheView) -> Result<(), ClientError> {
    if view.is_detached() {
        return std::future::pending().await;
    }
    view.changed().await
}

async fn owner_changed(view: &mut Option<CacheView>) -> Result<(), ClientError> {
    match view {
        Some(view) => view_changed(view).await,
        None => std::future::pending().await,
    }
}

enum Wake {
    Event(TerraformEvent),
    Refresh,
    AccountChanged,
    ScopeChanged,
    Stop,
}

struct TerraformActor {
    ctx: WorkflowContext,
    realm_id: RealmId,
    machine: TerraformMachine,
    views: Views,
    weak_tx: mpsc::WeakSender<TerraformEvent>,
    state_tx: watch::Sender<TerraformSnapshot>,
}

impl TerraformActor {
    async fn run(mut self, mut rx: mpsc::Receiver<TerraformEvent>) {
        let mut account = self.ctx.account.clone();
        let mut scope = self.ctx.scope.clone();
        account.borrow_and_update();
        scope.borrow_and_update();
        let (mut account_open, mut scope_open) = (true, true);

        let current = *account.borrow();
        self.reevaluate(current).await;

        loop {
            let wake = tokio::select! {
                event = rx.recv() => event.map_or(Wake::Stop, Wake::Event),
                _ = view_changed(&mut self.views.timers) => Wake::Refresh,
                _ = view_changed(&mut self.views.clock) => Wake::Refresh,
                _ = owner_changed(&mut self.views.owner) => Wake::Refresh,
                changed = account.changed(), if account_open => match changed {
                    Ok(()) => Wake::AccountChanged,
                    Err(_) => {
                        account_open = false;
                        Wake::Refresh
                    }
                },
                changed = scope.changed(), if scope_open => match changed {
                    Ok(()) => Wake::ScopeChanged,
                    Err(_) => {
                        scope_open = false;
                        Wake::Refresh
                    }
                },
            };

            match wake {
                Wake::Stop => break,
                Wake::Event(event) => self.process(event).await,
                Wake::Refresh => {}
                Wake::AccountChanged => {
                    account.borrow_and_update();
                    self.views = Views::open(&self.ctx, &self.realm_id);
                    self.process(TerraformEvent::OwnershipReset).await;
                }
                Wake::ScopeChanged => {
                    scope.borrow_and_update();
                    self.views = Views::open(&self.ctx, &self.realm_id);
                }
            }
            let current = *account.borrow();
            self.reevaluate(current).await;
        }
        debug!(realm_id = %self.realm_id, "Terraform workflow stopped");
    }

    async fn reevaluate(&mut self, account: Option<Address>) {
        for event in self.views.derive(account) {
            self.process(event).await;
        }
    }

    async fn process(&mut self, event: TerraformEvent) {
        let before = self.machine.snapshot();
        let effects = self.machine.handle(event);
        let after = self.machine.snapshot();

        if before != after {
            self.state_tx.send_replace(after.clone());
            let realm_id = Some(self.realm_id.as_str());
            self.ctx
                .announce(WORKFLOW, realm_id, before.ownership, after.ownership)
                .await;
            self.ctx
                .announce(WORKFLOW, realm_id, before.eligibility, after.eligibility)
                .await;
        }

        for effect in effects {
            self.apply(effect).await;
        }
    }

    async fn apply(&self, effect: TerraformEffect) {
        match effect {
            TerraformEffect::Write { attempt, slot } => {
                let Some(tx) = self.weak_tx.upgrade() else {
                    return;
                };
                info!(realm_id = %self.realm_id, slot = slot.index(), attempt, "Submitting terraform");
                let call = WriteCall::new(
                    Contract::Realm,
                    "terraform",
                    vec![
                        LedgerValue::Uint(self.realm_id.to_u256()),
                        LedgerValue::uint(slot.index() as u64),
                    ],
                );
                let ctx = self.ctx.clone();
                tokio::spawn(async move {
                    let event = match ctx.submit(call).await {
                        Ok(tx_hash) => TerraformEvent::Confirmed { attempt, tx_hash },
                        Err(error) => TerraformEvent::Reverted { attempt, error },
                    };
                    let _ = tx.send(event).await;
                });
            }
            TerraformEffect::Terraformed => {
                let id = self.realm_id.as_str();
                self.ctx.queries.cache().invalidate(KeyFilter::exact([
                    CacheKey::realm(id),
                    CacheKey::realm_timers(id),
                ]));
                self.ctx.notify_success("Realm terraformed successfully!").await;
            }
            TerraformEffect::Failed(error) => {
                self.ctx.notify_failure("Terraform Error", &error).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TERRAFORM_COOLDOWN_S;
    use crate::domain::LedgerError;
    use crate::workflows::testing::{harness, notifications, VIEWER};
    use shared_bus::Severity;

    fn slot(index: usize) -> FeatureSlot {
        FeatureSlot::new(index).unwrap()
    }

    fn eligible_owner() -> TerraformMachine {
        let mut machine = TerraformMachine::new();
        machine.handle(TerraformEvent::OwnershipResolved(true));
        machine.handle(TerraformEvent::Evaluated(true));
        machine
    }

    #[test]
    fn test_both_regions_gate_the_action() {
        let mut machine = TerraformMachine::new();
        machine.handle(TerraformEvent::Evaluated(true));
        assert!(!machine.can_terraform());
        assert!(machine.handle(TerraformEvent::Submit(slot(0))).is_empty());

        machine.handle(TerraformEvent::OwnershipResolved(true));
        assert!(machine.can_terraform());
    }

    #[test]
    fn test_ownership_resolves_once() {
        let mut machine = TerraformMachine::new();
        machine.handle(TerraformEvent::OwnershipResolved(false));
        machine.handle(TerraformEvent::OwnershipResolved(true));
        assert_eq!(machine.ownership(), Ownership::Viewer);

        machine.handle(TerraformEvent::OwnershipReset);
        machine.handle(TerraformEvent::OwnershipResolved(true));
        assert_eq!(machine.ownership(), Ownership::Owner);
    }

    #[test]
    fn test_pending_ignores_evaluations() {
        let mut machine = eligible_owner();
        let effects = machine.handle(TerraformEvent::Submit(slot(1)));
        assert_eq!(
            effects,
            vec![TerraformEffect::Write {
                attempt: 1,
                slot: slot(1)
            }]
        );
        machine.handle(TerraformEvent::Evaluated(false));
        machine.handle(TerraformEvent::Evaluated(true));
        assert_eq!(machine.eligibility(), TerraformEligibility::Pending);
    }

    #[test]
    fn test_confirmation_returns_to_no() {
        let mut machine = eligible_owner();
        machine.handle(TerraformEvent::Submit(slot(1)));
        let effects = machine.handle(TerraformEvent::Confirmed {
            attempt: 1,
            tx_hash: "0x1".into(),
        });
        assert_eq!(effects, vec![TerraformEffect::Terraformed]);
        assert_eq!(machine.eligibility(), TerraformEligibility::No);

        // Fresh data decides, not the confirmation.
        machine.handle(TerraformEvent::Evaluated(true));
        assert_eq!(machine.eligibility(), TerraformEligibility::Yes);
    }

    #[test]
    fn test_revert_returns_to_yes() {
        let mut machine = eligible_owner();
        machine.handle(TerraformEvent::Submit(slot(0)));
        let error = ClientError::from(LedgerError::WriteReverted {
            tx_hash: None,
            reason: "cooldown".into(),
        });
        let effects = machine.handle(TerraformEvent::Reverted { attempt: 1, error });
        assert!(matches!(effects[..], [TerraformEffect::Failed(_)]));
        assert_eq!(machine.eligibility(), TerraformEligibility::Yes);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut machine = eligible_owner();
        machine.handle(TerraformEvent::Submit(slot(0)));
        let effects = machine.handle(TerraformEvent::Confirmed {
            attempt: 7,
            tx_hash: "0x1".into(),
        });
        assert!(effects.is_empty());
        assert_eq!(machine.eligibility(), TerraformEligibility::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terraform_refetches_and_reevaluates() {
        let h = harness();
        let mut notes = h.notifications();
        let workflow = TerraformWorkflow::spawn(h.ctx.clone(), RealmId::parse("7").unwrap());

        workflow.wait_for(|s| s.can_terraform).await.unwrap();
        let timer_reads = h.ledger.read_count("terraformTime");

        workflow.terraform(1).await.unwrap();
        let done = workflow
            .wait_for(|s| s.last_tx.is_some() && s.eligibility == TerraformEligibility::No)
            .await
            .unwrap();
        assert!(!done.can_terraform);

        let realm = h.ledger.realm(7).unwrap();
        assert_eq!(realm.features[1], 4);

        let mut timers = h.ctx.queries.timers("7");
        let snapshot = timers
            .wait_for(|s| !s.is_fetching && !s.is_stale)
            .await
            .unwrap();
        let refreshed = snapshot.value().and_then(EntityValue::as_timers).unwrap();
        assert_eq!(refreshed.terraform_time, realm.terraform_time_s * 1000);
        assert!(h.ledger.read_count("terraformTime") > timer_reads);

        let received = notifications(&mut notes).await;
        assert_eq!(received[0].title, "Realm terraformed successfully!");

        // Once the cooldown passes on the ledger clock, the action comes back.
        h.ledger.advance_clock_ms((TERRAFORM_COOLDOWN_S + 1) * 1000);
        h.ctx.queries.refresh_clock();
        workflow.wait_for(|s| s.can_terraform).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_revert_notifies_and_keeps_features() {
        let h = harness();
        let mut notes = h.notifications();
        let workflow = TerraformWorkflow::spawn(h.ctx.clone(), RealmId::parse("7").unwrap());
        workflow.wait_for(|s| s.can_terraform).await.unwrap();

        h.ledger.reject_next_write("User denied transaction signature");
        workflow.terraform(0).await.unwrap();

        let received = notifications(&mut notes).await;
        assert_eq!(received[0].severity, Severity::Error);
        assert_eq!(received[0].title, "Terraform Error");
        workflow.wait_for(|s| s.can_terraform).await.unwrap();
        assert_eq!(h.ledger.realm(7).unwrap().features, [0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_cannot_terraform() {
        let h = harness();
        h.account.send_replace(Some(VIEWER));
        let workflow = TerraformWorkflow::spawn(h.ctx.clone(), RealmId::parse("7").unwrap());

        let snapshot = workflow
            .wait_for(|s| s.ownership != Ownership::Unknown)
            .await
            .unwrap();
        assert_eq!(snapshot.ownership, Ownership::Viewer);
        assert_eq!(
            workflow.terraform(0).await,
            Err(ClientError::NotEligible { action: "terraform" })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_is_validated_first() {
        let h = harness();
        let workflow = TerraformWorkflow::spawn(h.ctx.clone(), RealmId::parse("7").unwrap());
        assert_eq!(
            workflow.terraform(3).await,
            Err(ClientError::InvalidFeatureSlot(3))
        );
    }
}
