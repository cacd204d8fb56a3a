//! # Mint Workflow
//!
//! Form for claiming a new realm: id and name, debounced validation, one
//! claim write carrying the mint price.

use serde::{Deserialize, Serialize};
use shared_types::{Address, Contract, RealmId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::{schedule_validation, FormState, ValidationTimer, WorkflowContext};
use crate::domain::{invariant_mint_fields, CacheKey, ClientError, KeyFilter};
use crate::ports::{LedgerValue, WriteCall};

const WORKFLOW: &str = "mint";

/// Inputs of the mint machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintEvent {
    /// Id field edited.
    UpdateId(String),
    /// Name field edited.
    UpdateName(String),
    /// Connected account changed.
    AccountUpdated(Option<Address>),
    /// A debounce deadline fired.
    Timer {
        /// Validation epoch that armed it.
        epoch: u64,
        /// Which deadline.
        timer: ValidationTimer,
    },
    /// User pressed submit.
    Submit,
    /// The claim was included.
    Confirmed {
        /// Submission attempt.
        attempt: u64,
        /// Transaction hash.
        tx_hash: String,
    },
    /// The claim was rejected or reverted.
    Failed {
        /// Submission attempt.
        attempt: u64,
        /// Cause.
        error: ClientError,
    },
    /// Clear the form.
    Reset,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintEffect {
    /// Arm the debounce deadlines.
    Validate { epoch: u64 },
    /// Send the claim write.
    Claim {
        attempt: u64,
        id: RealmId,
        name: String,
    },
    /// Claim confirmed.
    Created { id: RealmId },
    /// Claim failed.
    Failed(ClientError),
}

/// Rendered state of the mint form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintSnapshot {
    pub state: FormState,
    pub id: String,
    pub name: String,
    /// Hash of the confirmed claim.
    pub last_tx: Option<String>,
}

/// Pure mint state machine.
#[derive(Debug, Clone)]
pub struct MintMachine {
    state: FormState,
    id: String,
    name: String,
    account: Option<Address>,
    require_account: bool,
    epoch: u64,
    attempt: u64,
    pending: Option<RealmId>,
    last_tx: Option<String>,
}

impl MintMachine {
    pub fn new(require_account: bool, account: Option<Address>) -> Self {
        Self {
            state: FormState::Invalid,
            id: String::new(),
            name: String::new(),
            account,
            require_account,
            epoch: 0,
            attempt: 0,
            pending: None,
            last_tx: None,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    /// Current validation epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current submission attempt.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn snapshot(&self) -> MintSnapshot {
        MintSnapshot {
            state: self.state,
            id: self.id.clone(),
            name: self.name.clone(),
            last_tx: self.last_tx.clone(),
        }
    }

    /// Whether the fields pass the predicate right now.
    pub fn is_valid(&self) -> bool {
        invariant_mint_fields(
            &self.id,
            &self.name,
            self.account.as_ref(),
            self.require_account,
        )
    }

    fn revalidate(&mut self) -> Vec<MintEffect> {
        self.epoch += 1;
        self.state = FormState::Validating;
        vec![MintEffect::Validate { epoch: self.epoch }]
    }

    /// Apply one event.
    pub fn handle(&mut self, event: MintEvent) -> Vec<MintEffect> {
        use FormState::*;

        match (self.state, event) {
            (Submitting | Success, MintEvent::UpdateId(_) | MintEvent::UpdateName(_)) => vec![],
            (Submitting | Success, MintEvent::AccountUpdated(account)) => {
                self.account = account;
                vec![]
            }
            (_, MintEvent::UpdateId(id)) => {
                self.id = id;
                self.revalidate()
            }
            (_, MintEvent::UpdateName(name)) => {
                self.name = name;
                self.revalidate()
            }
            (_, MintEvent::AccountUpdated(account)) => {
                self.account = account;
                self.revalidate()
            }

            (Validating, MintEvent::Timer { epoch, timer }) if epoch == self.epoch => {
                match timer {
                    ValidationTimer::Settle if self.is_valid() => self.state = Valid,
                    ValidationTimer::Settle => {}
                    ValidationTimer::Fallback => self.state = Invalid,
                }
                vec![]
            }
            (_, MintEvent::Timer { .. }) => vec![],

            (Valid, MintEvent::Submit) => match RealmId::parse(&self.id) {
                Ok(id) if self.is_valid() => {
                    self.attempt += 1;
                    self.state = Submitting;
                    self.pending = Some(id.clone());
                    vec![MintEffect::Claim {
                        attempt: self.attempt,
                        id,
                        name: self.name.clone(),
                    }]
                }
                // Account dropped between settle and submit.
                _ => {
                    self.state = Invalid;
                    vec![]
                }
            },
            (_, MintEvent::Submit) => vec![],

            (Submitting, MintEvent::Confirmed { attempt, tx_hash }) if attempt == self.attempt => {
                self.state = Success;
                self.last_tx = Some(tx_hash);
                self.pending
                    .take()
                    .map(|id| MintEffect::Created { id })
                    .into_iter()
                    .collect()
            }
            (Submitting, MintEvent::Failed { attempt, error }) if attempt == self.attempt => {
                self.state = Valid;
                self.pending = None;
                vec![MintEffect::Failed(error)]
            }
            (_, MintEvent::Confirmed { .. } | MintEvent::Failed { .. }) => vec![],

            (Submitting | Success, MintEvent::Reset) => {
                self.id.clear();
                self.name.clear();
                self.pending = None;
                self.last_tx = None;
                // Disarms pending debounce deadlines.
                self.epoch += 1;
                self.state = Invalid;
                vec![]
            }
            (_, MintEvent::Reset) => vec![],
        }
    }
}

/// Handle to a running mint actor.
pub struct MintWorkflow {
    tx: mpsc::Sender<MintEvent>,
    state: watch::Receiver<MintSnapshot>,
}

impl MintWorkflow {
    /// Start the actor on the current runtime.
    pub fn spawn(ctx: WorkflowContext) -> Self {
        let (tx, rx) = mpsc::channel(ctx.config.command_buffer);
        let mut account = ctx.account.clone();
        let initial = *account.borrow_and_update();
        let machine = MintMachine::new(ctx.config.require_account_for_mint, initial);
        let (state_tx, state_rx) = watch::channel(machine.snapshot());

        tokio::spawn(run(ctx, machine, rx, tx.downgrade(), account, state_tx));
        Self {
            tx,
            state: state_rx,
        }
    }

    async fn send(&self, event: MintEvent) -> Result<(), ClientError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ClientError::WorkflowClosed)
    }

    pub async fn set_id(&self, id: impl Into<String>) -> Result<(), ClientError> {
        self.send(MintEvent::UpdateId(id.into())).await
    }

    pub async fn set_name(&self, name: impl Into<String>) -> Result<(), ClientError> {
        self.send(MintEvent::UpdateName(name.into())).await
    }

    /// Submit the claim. Ignored unless the form is `Valid`.
    pub async fn submit(&self) -> Result<(), ClientError> {
        self.send(MintEvent::Submit).await
    }

    pub async fn reset(&self) -> Result<(), ClientError> {
        self.send(MintEvent::Reset).await
    }

    pub fn snapshot(&self) -> MintSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MintSnapshot> {
        self.state.clone()
    }

    /// Wait until the rendered state satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<MintSnapshot, ClientError>
    where
        F: FnMut(&MintSnapshot) -> bool,
    {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(predicate)
            .await
            .map_err(|_| ClientError::WorkflowClosed)?;
        Ok(snapshot.clone())
    }
}

async fn run(
    ctx: WorkflowContext,
    mut machine: MintMachine,
    mut rx: mpsc::Receiver<MintEvent>,
    weak_tx: mpsc::WeakSender<MintEvent>,
    mut account: watch::Receiver<Option<Address>>,
    state_tx: watch::Sender<MintSnapshot>,
) {
    let mut account_open = true;

    loop {
        let event = tokio::select! {
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
            changed = account.changed(), if account_open => match changed {
                Ok(()) => {
                    let current = *account.borrow_and_update();
                    MintEvent::AccountUpdated(current)
                }
                Err(_) => {
                    account_open = false;
                    continue;
                }
            },
        };

        let from = machine.state();
        let effects = machine.handle(event);
        state_tx.send_replace(machine.snapshot());
        ctx.announce(WORKFLOW, None, from, machine.state()).await;

        for effect in effects {
            apply(&ctx, &weak_tx, effect).await;
        }
    }
    debug!("Mint workflow stopped");
}

async fn apply(ctx: &WorkflowContext, weak_tx: &mpsc::WeakSender<MintEvent>, effect: MintEffect) {
    let Some(tx) = weak_tx.upgrade() else {
        return;
    };

    match effect {
        MintEffect::Validate { epoch } => {
            schedule_validation(&ctx.config, &tx, epoch, |epoch, timer| MintEvent::Timer {
                epoch,
                timer,
            });
        }
        MintEffect::Claim { attempt, id, name } => {
            info!(realm_id = %id, attempt, "Submitting claim");
            let call = WriteCall::new(
                Contract::Realm,
                "claim",
                vec![LedgerValue::Uint(id.to_u256()), LedgerValue::Text(name)],
            )
            .with_value(ctx.config.mint_price_wei);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let event = match ctx.submit(call).await {
                    Ok(tx_hash) => MintEvent::Confirmed { attempt, tx_hash },
                    Err(error) => MintEvent::Failed { attempt, error },
                };
                let _ = tx.send(event).await;
            });
        }
        MintEffect::Created { id } => {
            info!(realm_id = %id, "Realm created");
            ctx.queries
                .cache()
                .invalidate(KeyFilter::exact([CacheKey::current_tokens()]));
            let queries = ctx.queries.clone();
            tokio::spawn(async move { queries.prefetch_realm(&id).await });
            ctx.notify_success("Realm Created").await;
        }
        MintEffect::Failed(error) => {
            ctx.notify_failure("Error", &error).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LedgerError;
    use crate::workflows::testing::{harness, notifications, OWNER};
    use shared_bus::Severity;
    use std::time::Duration;

    fn settle(machine: &mut MintMachine) {
        let epoch = machine.epoch();
        machine.handle(MintEvent::Timer {
            epoch,
            timer: ValidationTimer::Settle,
        });
    }

    fn filled() -> MintMachine {
        let mut machine = MintMachine::new(true, Some(OWNER));
        machine.handle(MintEvent::UpdateId("42".into()));
        machine.handle(MintEvent::UpdateName("Foo".into()));
        settle(&mut machine);
        machine
    }

    #[test]
    fn test_predicate_examples() {
        assert_eq!(filled().state(), FormState::Valid);

        let mut machine = MintMachine::new(true, Some(OWNER));
        machine.handle(MintEvent::UpdateId("abc".into()));
        machine.handle(MintEvent::UpdateName("Foo".into()));
        settle(&mut machine);
        assert_eq!(machine.state(), FormState::Validating);

        let mut machine = MintMachine::new(true, Some(OWNER));
        machine.handle(MintEvent::UpdateId("42".into()));
        machine.handle(MintEvent::UpdateName("".into()));
        settle(&mut machine);
        assert!(!machine.is_valid());
    }

    #[test]
    fn test_zero_id_never_validates() {
        let mut machine = MintMachine::new(true, Some(OWNER));
        machine.handle(MintEvent::UpdateId("0".into()));
        machine.handle(MintEvent::UpdateName("Foo".into()));
        settle(&mut machine);
        assert_eq!(machine.state(), FormState::Validating);
        assert!(machine.handle(MintEvent::Submit).is_empty());
    }

    #[test]
    fn test_fallback_forces_invalid() {
        let mut machine = MintMachine::new(true, None);
        machine.handle(MintEvent::UpdateId("42".into()));
        let epoch = machine.epoch();
        machine.handle(MintEvent::Timer {
            epoch,
            timer: ValidationTimer::Settle,
        });
        machine.handle(MintEvent::Timer {
            epoch,
            timer: ValidationTimer::Fallback,
        });
        assert_eq!(machine.state(), FormState::Invalid);
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut machine = MintMachine::new(true, Some(OWNER));
        machine.handle(MintEvent::UpdateId("42".into()));
        let stale = machine.epoch();
        machine.handle(MintEvent::UpdateName("Foo".into()));
        machine.handle(MintEvent::Timer {
            epoch: stale,
            timer: ValidationTimer::Fallback,
        });
        assert_eq!(machine.state(), FormState::Validating);
    }

    #[test]
    fn test_account_update_revalidates() {
        let mut machine = filled();
        let effects = machine.handle(MintEvent::AccountUpdated(None));
        assert_eq!(machine.state(), FormState::Validating);
        assert!(matches!(effects[..], [MintEffect::Validate { .. }]));
        settle(&mut machine);
        assert_eq!(machine.state(), FormState::Validating);
    }

    #[test]
    fn test_submit_failure_returns_to_valid_with_fields() {
        let mut machine = filled();
        let effects = machine.handle(MintEvent::Submit);
        assert!(matches!(effects[..], [MintEffect::Claim { attempt: 1, .. }]));
        assert_eq!(machine.state(), FormState::Submitting);

        // Edits are ignored while submitting.
        machine.handle(MintEvent::UpdateName("Bar".into()));
        let error = ClientError::from(LedgerError::WriteRejected("denied".into()));
        let effects = machine.handle(MintEvent::Failed { attempt: 1, error });
        assert!(matches!(effects[..], [MintEffect::Failed(_)]));
        assert_eq!(machine.state(), FormState::Valid);
        assert_eq!(machine.snapshot().name, "Foo");
    }

    #[test]
    fn test_reset_during_submit_discards_completion() {
        let mut machine = filled();
        machine.handle(MintEvent::Submit);
        machine.handle(MintEvent::Reset);
        assert_eq!(machine.state(), FormState::Invalid);

        let effects = machine.handle(MintEvent::Confirmed {
            attempt: 1,
            tx_hash: "0x1".into(),
        });
        assert!(effects.is_empty());
        assert_eq!(machine.state(), FormState::Invalid);
        assert_eq!(machine.snapshot().id, "");
    }

    #[test]
    fn test_reset_from_success_clears_fields() {
        let mut machine = filled();
        machine.handle(MintEvent::Submit);
        let effects = machine.handle(MintEvent::Confirmed {
            attempt: 1,
            tx_hash: "0x1".into(),
        });
        assert!(matches!(&effects[..], [MintEffect::Created { id }] if id.as_str() == "42"));
        assert_eq!(machine.state(), FormState::Success);

        machine.handle(MintEvent::Reset);
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.state, FormState::Invalid);
        assert!(snapshot.id.is_empty() && snapshot.name.is_empty());
    }

    #[test]
    fn test_submit_outside_valid_is_ignored() {
        let mut machine = MintMachine::new(true, Some(OWNER));
        assert!(machine.handle(MintEvent::Submit).is_empty());
        assert_eq!(machine.state(), FormState::Invalid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_debounces_and_mints() {
        let h = harness();
        let mut notes = h.notifications();
        let mint = MintWorkflow::spawn(h.ctx.clone());

        mint.set_id("42").await.unwrap();
        mint.set_name("Foo").await.unwrap();
        mint.wait_for(|s| s.state == FormState::Valid).await.unwrap();

        // The fallback deadline of a settled form is inert.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(mint.snapshot().state, FormState::Valid);

        mint.submit().await.unwrap();
        let done = mint.wait_for(|s| s.state == FormState::Success).await.unwrap();
        assert!(done.last_tx.is_some());
        assert_eq!(h.ledger.realm(42).unwrap().owner, OWNER);

        let received = notifications(&mut notes).await;
        assert_eq!(received[0].severity, Severity::Success);
        assert_eq!(received[0].title, "Realm Created");
    }
}
