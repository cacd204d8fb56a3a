//! # Value Objects
//!
//! Cache keys, invalidation filters and the terraformable feature slot.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::Address;

use super::errors::ClientError;
use super::invariants::TERRAFORMABLE_SLOTS;

/// Hierarchical cache key, e.g. `("realm", "7", "timers")`.
///
/// Keys are compared segment by segment, so `("realm", "7")` is a prefix of
/// `("realm", "7", "timers")` but not of `("realm", "70")`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    /// Build a key from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// `("realm", id)`
    pub fn realm(id: &str) -> Self {
        Self::new(["realm", id])
    }

    /// `("realm-name", id)`
    pub fn realm_name(id: &str) -> Self {
        Self::new(["realm-name", id])
    }

    /// `("realm", id, "resources")`
    pub fn realm_resources(id: &str) -> Self {
        Self::new(["realm", id, "resources"])
    }

    /// `("realm", id, "timers")`
    pub fn realm_timers(id: &str) -> Self {
        Self::new(["realm", id, "timers"])
    }

    /// `("realm", id, "queue")`
    pub fn realm_queue(id: &str) -> Self {
        Self::new(["realm", id, "queue"])
    }

    /// `("realm", id, "farms")`
    pub fn realm_farms(id: &str) -> Self {
        Self::new(["realm", id, "farms"])
    }

    /// `("owner", account, id)`
    pub fn owner(account: &Address, id: &str) -> Self {
        Self::new(["owner".to_string(), account.to_hex(), id.to_string()])
    }

    /// `("accounts",)`
    pub fn accounts() -> Self {
        Self::new(["accounts"])
    }

    /// `("current-tokens",)`
    pub fn current_tokens() -> Self {
        Self::new(["current-tokens"])
    }

    /// `("block-timestamp",)`
    pub fn block_timestamp() -> Self {
        Self::new(["block-timestamp"])
    }

    /// Key segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `prefix` matches the leading segments of this key.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", segment)?;
        }
        write!(f, ")")
    }
}

/// Which entries an invalidation touches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyFilter {
    /// Exactly these keys.
    Exact(Vec<CacheKey>),
    /// Every key that starts with this one, the key itself included.
    Prefix(CacheKey),
}

impl KeyFilter {
    /// Exact-match filter over a set of keys.
    pub fn exact<I: IntoIterator<Item = CacheKey>>(keys: I) -> Self {
        Self::Exact(keys.into_iter().collect())
    }

    /// Prefix filter.
    pub fn prefix(key: CacheKey) -> Self {
        Self::Prefix(key)
    }

    /// Whether `key` is selected.
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            Self::Exact(keys) => keys.contains(key),
            Self::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

/// Index of a terraformable feature slot (0, 1 or 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSlot(usize);

impl FeatureSlot {
    /// Validate a slot index.
    pub fn new(index: usize) -> Result<Self, ClientError> {
        if index < TERRAFORMABLE_SLOTS {
            Ok(Self(index))
        } else {
            Err(ClientError::InvalidFeatureSlot(index))
        }
    }

    /// The raw index.
    pub fn index(&self) -> usize {
        self.0
    }
}
