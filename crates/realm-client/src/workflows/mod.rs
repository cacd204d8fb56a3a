//! # Workflows
//!
//! Mint, terraform and the single-shot realm actions. Mint and terraform are
//! actor tasks: a pure `(state, event)` machine fed from one channel, with
//! timers and ledger completions fed back as events tagged by the epoch or
//! attempt they belong to.

pub mod action;
pub mod mint;
pub mod terraform;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_bus::{EventPublisher, Notification, SessionEvent};
use shared_types::Address;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::domain::{humanize, ClientError};
use crate::ports::{ChainWriter, WriteCall};
use crate::queries::RealmQueries;

pub use action::{ActionKind, ActionOutcome, ActionSnapshot, ActionState, ActionWorkflow};
pub use mint::{MintEvent, MintMachine, MintSnapshot, MintWorkflow};
pub use terraform::{
    Ownership, TerraformEligibility, TerraformEvent, TerraformMachine, TerraformSnapshot,
    TerraformWorkflow,
};

/// States of a user-input form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormState {
    /// Fields fail the predicate.
    Invalid,
    /// Waiting for the debounce to settle.
    Validating,
    /// Ready to submit.
    Valid,
    /// Write sent, awaiting confirmation.
    Submitting,
    /// Write confirmed.
    Success,
}

/// The two debounce deadlines armed by every field update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationTimer {
    /// Evaluate the predicate.
    Settle,
    /// Give up and fall back to `Invalid`.
    Fallback,
}

/// Everything a workflow needs from its session.
#[derive(Clone)]
pub struct WorkflowContext {
    pub config: Arc<ClientConfig>,
    pub queries: RealmQueries,
    pub writer: Arc<dyn ChainWriter>,
    pub publisher: Arc<dyn EventPublisher>,
    /// Connected account.
    pub account: watch::Receiver<Option<Address>>,
    /// Bumped every time the session clears the cache.
    pub scope: watch::Receiver<u64>,
}

impl WorkflowContext {
    /// Sign, broadcast and wait for inclusion. Returns the transaction hash.
    pub(crate) async fn submit(&self, call: WriteCall) -> Result<String, ClientError> {
        debug!(call = %call, "Submitting write");
        let pending = self.writer.write(call.clone()).await?;
        let tx_hash = pending.tx_hash().to_string();
        info!(call = %call, tx_hash = %tx_hash, "Write broadcast");
        pending.confirm().await?;
        info!(call = %call, tx_hash = %tx_hash, "Write confirmed");
        Ok(tx_hash)
    }

    pub(crate) async fn notify_success(&self, title: &str) {
        let note = Notification::success(title, self.config.notification_duration_ms);
        self.publisher.publish(SessionEvent::Notification(note)).await;
    }

    pub(crate) async fn notify_failure(&self, title: &str, error: &ClientError) {
        warn!(%error, title, "Workflow failed");
        let description = humanize(error, &self.config.noisy_error_marker);
        let note = Notification::error(title, description, self.config.notification_duration_ms);
        self.publisher.publish(SessionEvent::Notification(note)).await;
    }

    pub(crate) async fn announce<S: Debug + PartialEq>(
        &self,
        workflow: &str,
        realm_id: Option<&str>,
        from: S,
        to: S,
    ) {
        if from == to {
            return;
        }
        debug!(workflow, realm_id, from = ?from, to = ?to, "Workflow transition");
        self.publisher
            .publish(SessionEvent::WorkflowTransition {
                workflow: workflow.to_string(),
                realm_id: realm_id.map(str::to_string),
                from: format!("{from:?}"),
                to: format!("{to:?}"),
            })
            .await;
    }
}

/// Arm the settle and fallback deadlines for validation epoch `epoch`.
pub(crate) fn schedule_validation<E, F>(
    config: &ClientConfig,
    tx: &mpsc::Sender<E>,
    epoch: u64,
    make: F,
) where
    E: Send + 'static,
    F: Fn(u64, ValidationTimer) -> E,
{
    let deadlines = [
        (config.validation_settle_ms, ValidationTimer::Settle),
        (config.validation_fallback_ms, ValidationTimer::Fallback),
    ];
    for (delay_ms, timer) in deadlines {
        let tx = tx.clone();
        let event = make(epoch, timer);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            // Closed channel: the workflow is gone.
            let _ = tx.send(event).await;
        });
    }
}
