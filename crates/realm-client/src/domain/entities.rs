//! # Cached Entities
//!
//! The value stored under each cache key.

use serde::{Deserialize, Serialize};
use shared_types::{Address, BuildQueue, Farms, Realm, ResourceSet, Timers};

/// A resolved cache value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityValue {
    /// `("realm", id)`
    Realm(Realm),
    /// `("realm-name", id)`
    RealmName(String),
    /// `("realm", id, "resources")`
    Resources(ResourceSet),
    /// `("realm", id, "timers")`
    Timers(Timers),
    /// `("realm", id, "queue")`
    Queue(BuildQueue),
    /// `("realm", id, "farms")`
    Farms(Farms),
    /// `("owner", account, id)`
    Owner(bool),
    /// `("accounts",)`
    Accounts(Vec<Address>),
    /// `("current-tokens",)`
    TokenCount(u64),
    /// `("block-timestamp",)`, in milliseconds.
    BlockTimestamp(u64),
}

impl EntityValue {
    /// Variant name, for logs and decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Realm(_) => "realm",
            Self::RealmName(_) => "realm-name",
            Self::Resources(_) => "resources",
            Self::Timers(_) => "timers",
            Self::Queue(_) => "queue",
            Self::Farms(_) => "farms",
            Self::Owner(_) => "owner",
            Self::Accounts(_) => "accounts",
            Self::TokenCount(_) => "token-count",
            Self::BlockTimestamp(_) => "block-timestamp",
        }
    }

    pub fn as_realm(&self) -> Option<&Realm> {
        match self {
            Self::Realm(realm) => Some(realm),
            _ => None,
        }
    }

    pub fn as_realm_name(&self) -> Option<&str> {
        match self {
            Self::RealmName(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_resources(&self) -> Option<&ResourceSet> {
        match self {
            Self::Resources(resources) => Some(resources),
            _ => None,
        }
    }

    pub fn as_timers(&self) -> Option<&Timers> {
        match self {
            Self::Timers(timers) => Some(timers),
            _ => None,
        }
    }

    pub fn as_queue(&self) -> Option<&BuildQueue> {
        match self {
            Self::Queue(queue) => Some(queue),
            _ => None,
        }
    }

    pub fn as_farms(&self) -> Option<&Farms> {
        match self {
            Self::Farms(farms) => Some(farms),
            _ => None,
        }
    }

    pub fn as_owner(&self) -> Option<bool> {
        match self {
            Self::Owner(owner) => Some(*owner),
            _ => None,
        }
    }

    pub fn as_accounts(&self) -> Option<&[Address]> {
        match self {
            Self::Accounts(accounts) => Some(accounts),
            _ => None,
        }
    }

    pub fn as_token_count(&self) -> Option<u64> {
        match self {
            Self::TokenCount(count) => Some(*count),
            _ => None,
        }
    }

    pub fn as_block_timestamp(&self) -> Option<u64> {
        match self {
            Self::BlockTimestamp(ms) => Some(*ms),
            _ => None,
        }
    }
}
