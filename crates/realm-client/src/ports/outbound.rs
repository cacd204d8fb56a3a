//! # Outbound Ports
//!
//! What the engine needs from the ledger: contract reads, signed writes and
//! the wallet's account list. Values crossing these ports are already
//! normalized; callers never see ABI encoding.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Contract, U256};

use crate::domain::{ClientError, LedgerError};

/// A decoded ledger value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerValue {
    /// Unsigned integer (counters, ids, timestamps in seconds).
    Uint(U256),
    /// String.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Account or contract address.
    Address(Address),
    /// Tuple or array.
    List(Vec<LedgerValue>),
}

impl LedgerValue {
    /// Integer argument from a `u64`.
    pub fn uint(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }

    /// Decode an integer that must fit in `u64`.
    pub fn as_u64(&self, what: &str) -> Result<u64, ClientError> {
        match self {
            Self::Uint(v) if *v <= U256::from(u64::MAX) => Ok(v.low_u64()),
            Self::Uint(v) => Err(ClientError::unexpected(what, format!("{v} overflows u64"))),
            other => Err(ClientError::unexpected(what, other.shape())),
        }
    }

    /// Decode a string.
    pub fn as_text(&self, what: &str) -> Result<String, ClientError> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            other => Err(ClientError::unexpected(what, other.shape())),
        }
    }

    /// Decode a boolean.
    pub fn as_bool(&self, what: &str) -> Result<bool, ClientError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(ClientError::unexpected(what, other.shape())),
        }
    }

    /// Decode an address.
    pub fn as_address(&self, what: &str) -> Result<Address, ClientError> {
        match self {
            Self::Address(a) => Ok(*a),
            other => Err(ClientError::unexpected(what, other.shape())),
        }
    }

    /// Decode a tuple of exactly `len` items.
    pub fn as_tuple(&self, what: &str, len: usize) -> Result<&[LedgerValue], ClientError> {
        match self {
            Self::List(items) if items.len() == len => Ok(items),
            Self::List(items) => Err(ClientError::unexpected(
                what,
                format!("tuple of {} (expected {len})", items.len()),
            )),
            other => Err(ClientError::unexpected(what, other.shape())),
        }
    }

    /// Decode a list of any length.
    pub fn as_list(&self, what: &str) -> Result<&[LedgerValue], ClientError> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(ClientError::unexpected(what, other.shape())),
        }
    }

    fn shape(&self) -> String {
        match self {
            Self::Uint(_) => "uint".into(),
            Self::Text(_) => "text".into(),
            Self::Bool(_) => "bool".into(),
            Self::Address(_) => "address".into(),
            Self::List(items) => format!("list of {}", items.len()),
        }
    }
}

/// A contract read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    /// Target contract.
    pub contract: Contract,
    /// Method name.
    pub method: &'static str,
    /// Arguments.
    pub args: Vec<LedgerValue>,
}

impl ReadCall {
    /// Build a read.
    pub fn new(contract: Contract, method: &'static str, args: Vec<LedgerValue>) -> Self {
        Self { contract, method, args }
    }
}

impl fmt::Display for ReadCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.contract, self.method)
    }
}

/// A state-changing contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    /// Target contract.
    pub contract: Contract,
    /// Method name.
    pub method: &'static str,
    /// Arguments.
    pub args: Vec<LedgerValue>,
    /// Native value attached, in wei.
    pub value: Option<U256>,
    /// Explicit gas limit.
    pub gas_limit: Option<u64>,
}

impl WriteCall {
    /// Build a write with no value and default gas.
    pub fn new(contract: Contract, method: &'static str, args: Vec<LedgerValue>) -> Self {
        Self {
            contract,
            method,
            args,
            value: None,
            gas_limit: None,
        }
    }

    /// Attach native value.
    pub fn with_value(mut self, wei: U256) -> Self {
        self.value = Some(wei);
        self
    }

    /// Set an explicit gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

impl fmt::Display for WriteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.contract, self.method)
    }
}

/// Ledger reads - outbound port.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Perform a contract read.
    async fn read(&self, call: ReadCall) -> Result<LedgerValue, LedgerError>;

    /// Timestamp of the latest block, in milliseconds.
    async fn current_clock(&self) -> Result<u64, LedgerError>;

    /// Accounts the wallet currently exposes (empty when locked).
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError>;
}

/// Signed ledger writes - outbound port.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Sign and broadcast a write. Resolves once the transaction is sent.
    async fn write(&self, call: WriteCall) -> Result<Box<dyn PendingTransaction>, LedgerError>;

    /// Ask the wallet to connect and return the granted accounts.
    async fn request_accounts(&self) -> Result<Vec<Address>, LedgerError>;
}

/// A broadcast transaction awaiting inclusion.
#[async_trait]
pub trait PendingTransaction: Send {
    /// Transaction hash.
    fn tx_hash(&self) -> &str;

    /// Wait for inclusion. Fails with `WriteReverted` if the call reverted.
    async fn confirm(self: Box<Self>) -> Result<(), LedgerError>;
}
