//! # Domain Errors
//!
//! Ledger failures as reported by the ports, and the client-level error that
//! wraps them together with the engine's own rejections.

use shared_types::{Contract, IdentityError};
use thiserror::Error;

/// Message shown instead of a provider error that only carries noise.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";

/// Failure reported by a ledger port.
///
/// Cloneable so one failed fetch can be handed to every view of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A contract read reverted or failed.
    #[error("Read failed: {contract}.{method}: {reason}")]
    ReadFailure {
        /// Contract that was read.
        contract: Contract,
        /// Method name.
        method: String,
        /// Provider message.
        reason: String,
        /// Raw revert payload, when the ledger returned one.
        revert_data: Option<Vec<u8>>,
    },

    /// The wallet refused to sign or send.
    #[error("{0}")]
    WriteRejected(String),

    /// The transaction was mined but reverted.
    #[error("{reason}")]
    WriteReverted {
        /// Hash of the reverted transaction, if it was broadcast.
        tx_hash: Option<String>,
        /// Revert reason.
        reason: String,
    },

    /// Transport failure or timeout.
    #[error("Network error: {0}")]
    NetworkOrTimeout(String),
}

/// Client error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Failure bubbled up from a ledger port.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Malformed id or address.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// An operation needs a connected account.
    #[error("No account connected")]
    NotConnected,

    /// Terraform targets one of the three terraformable slots only.
    #[error("Feature slot {0} is not terraformable")]
    InvalidFeatureSlot(usize),

    /// The action's eligibility flag is false.
    #[error("{action} is not currently eligible")]
    NotEligible {
        /// Action name.
        action: &'static str,
    },

    /// The same action is already being submitted.
    #[error("{0} already in progress")]
    Busy(&'static str),

    /// The workflow task has stopped.
    #[error("Workflow closed")]
    WorkflowClosed,

    /// The cache entry backing a view was cleared.
    #[error("Cache entry detached: {0}")]
    Detached(String),

    /// A ledger value did not have the expected shape.
    #[error("Unexpected ledger value for {what}: {detail}")]
    UnexpectedValue {
        /// What was being decoded.
        what: String,
        /// What was found instead.
        detail: String,
    },
}

impl ClientError {
    /// Build an `UnexpectedValue` error.
    pub fn unexpected(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedValue {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

/// Text to show the user for a failed action.
///
/// Messages containing `noisy_marker` are provider diagnostics rather than
/// explanations and are replaced by [`UNKNOWN_ERROR_MESSAGE`].
pub fn humanize(error: &ClientError, noisy_marker: &str) -> String {
    let message = error.to_string();
    if !noisy_marker.is_empty() && message.contains(noisy_marker) {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

/// Configuration rejected by `ClientConfig::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field is outside its allowed range.
    #[error("Invalid config field {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}
