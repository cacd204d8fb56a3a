//! # Single-Shot Realm Actions
//!
//! Collect, build-city and build-farm: gated by a precomputed eligibility
//! flag, submitted once, confirmed, then the realm's keys are refreshed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared_types::{Contract, RealmId};
use tokio::sync::{oneshot, watch};
use tracing::info;

use super::WorkflowContext;
use crate::config::ClientConfig;
use crate::domain::{humanize, CacheKey, ClientError, Eligibility, KeyFilter, QueueEligibility};
use crate::ports::{LedgerValue, WriteCall};

/// Farm kind targeted by a farm build.
const DEFAULT_FARM_KIND: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Collect,
    BuildCity,
    BuildFarm,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::BuildCity => "build-city",
            Self::BuildFarm => "build-farm",
        }
    }

    fn success_title(&self) -> &'static str {
        match self {
            Self::Collect => "Collected resources successfully!",
            Self::BuildCity => "City built successfully!",
            Self::BuildFarm => "Farm built successfully!",
        }
    }

    fn failure_title(&self) -> &'static str {
        match self {
            Self::Collect => "Collection Error",
            Self::BuildCity => "City Building Error",
            Self::BuildFarm => "Farm Build Error",
        }
    }

    /// The flag that gates this action.
    pub fn is_eligible(&self, eligibility: &Eligibility, queue: &QueueEligibility) -> bool {
        match self {
            Self::Collect => eligibility.can_collect,
            Self::BuildCity => eligibility.can_build_city,
            Self::BuildFarm => queue.can_build_farm,
        }
    }

    fn call(&self, id: &RealmId, config: &ClientConfig) -> WriteCall {
        let id = LedgerValue::Uint(id.to_u256());
        match self {
            Self::Collect => WriteCall::new(Contract::Data, "collect", vec![id]),
            Self::BuildCity => WriteCall::new(Contract::City, "build", vec![id]),
            Self::BuildFarm => WriteCall::new(
                Contract::Farm,
                "build",
                vec![id, LedgerValue::uint(DEFAULT_FARM_KIND)],
            )
            .with_gas_limit(config.farm_build_gas_limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionState {
    Idle,
    Submitting,
    Succeeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    pub state: ActionState,
    pub attempt: u64,
    pub last_tx: Option<String>,
    /// Humanized cause of the latest failed attempt, cleared on resubmit.
    pub last_error: Option<String>,
}

/// A confirmed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub tx_hash: String,
}

/// One action on one realm. Clones share state.
#[derive(Clone)]
pub struct ActionWorkflow {
    ctx: WorkflowContext,
    realm_id: RealmId,
    kind: ActionKind,
    state: Arc<watch::Sender<ActionSnapshot>>,
}

impl ActionWorkflow {
    pub fn new(ctx: WorkflowContext, realm_id: RealmId, kind: ActionKind) -> Self {
        let (state, _) = watch::channel(ActionSnapshot {
            state: ActionState::Idle,
            attempt: 0,
            last_tx: None,
            last_error: None,
        });
        Self {
            ctx,
            realm_id,
            kind,
            state: Arc::new(state),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn realm_id(&self) -> &RealmId {
        &self.realm_id
    }

    pub fn snapshot(&self) -> ActionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionSnapshot> {
        self.state.subscribe()
    }

    /// Submit the action and wait for confirmation.
    ///
    /// Refuses when `eligible` is false or a submission is already in flight.
    /// The write runs on its own task: dropping the returned future leaves it
    /// to confirm, refresh the cache and notify. A failure returns the action
    /// to its state before the submit and is also reported as a notification.
    pub async fn submit(&self, eligible: bool) -> Result<ActionOutcome, ClientError> {
        let action = self.kind.name();
        if !eligible {
            return Err(ClientError::NotEligible { action });
        }

        let mut begun = None;
        self.state.send_if_modified(|snapshot| {
            if snapshot.state == ActionState::Submitting {
                return false;
            }
            begun = Some(snapshot.state);
            snapshot.state = ActionState::Submitting;
            snapshot.attempt += 1;
            snapshot.last_error = None;
            true
        });
        let from = begun.ok_or(ClientError::Busy(action))?;

        let (done_tx, done_rx) = oneshot::channel();
        let this = self.clone();
        tokio::spawn(async move {
            let _ = done_tx.send(this.run(from).await);
        });
        done_rx.await.map_err(|_| ClientError::WorkflowClosed)?
    }

    async fn run(&self, from: ActionState) -> Result<ActionOutcome, ClientError> {
        self.announce(from, ActionState::Submitting).await;

        info!(realm_id = %self.realm_id, action = self.kind.name(), "Submitting action");
        let call = self.kind.call(&self.realm_id, &self.ctx.config);
        match self.ctx.submit(call).await {
            Ok(tx_hash) => {
                self.ctx
                    .queries
                    .cache()
                    .invalidate(KeyFilter::prefix(CacheKey::realm(self.realm_id.as_str())));
                self.finish(ActionState::Succeeded, |snapshot| {
                    snapshot.last_tx = Some(tx_hash.clone());
                })
                .await;
                self.ctx.notify_success(self.kind.success_title()).await;
                Ok(ActionOutcome { tx_hash })
            }
            Err(error) => {
                let description = humanize(&error, &self.ctx.config.noisy_error_marker);
                self.finish(from, |snapshot| snapshot.last_error = Some(description))
                    .await;
                self.ctx
                    .notify_failure(self.kind.failure_title(), &error)
                    .await;
                Err(error)
            }
        }
    }

    async fn finish<F>(&self, state: ActionState, update: F)
    where
        F: FnOnce(&mut ActionSnapshot),
    {
        self.state.send_modify(|snapshot| {
            snapshot.state = state;
            update(snapshot);
        });
        self.announce(ActionState::Submitting, state).await;
    }

    async fn announce(&self, from: ActionState, to: ActionState) {
        self.ctx
            .announce(self.kind.name(), Some(self.realm_id.as_str()), from, to)
            .await;
    }
}
