//! # Ledger Entities
//!
//! Values mirrored from the realm contracts. Every timestamp in this module is
//! already normalized to milliseconds; ledger seconds never leak past the
//! query layer.
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `RealmId`
//! - **Realm**: `Realm`, `Feature`
//! - **Economy**: `Resource`, `ResourceSet`, `Timers`, `BuildQueue`, `Farms`

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTITY
// =============================================================================

/// Errors raised while parsing identifiers handed over by the UI or the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Address was not 20 bytes of hex.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Realm id was empty or not a decimal integer.
    #[error("Invalid realm id: {0:?}")]
    InvalidRealmId(String),

    /// Chain id not among the supported networks.
    #[error("Unknown chain: {0}")]
    UnknownChain(String),
}

/// A 20-byte account address.
///
/// Parsing is case-insensitive and accepts an optional `0x` prefix, so two
/// checksummed spellings of the same account compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Lowercase `0x`-prefixed hex form, used inside cache keys.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes =
            hex::decode(digits).map_err(|_| IdentityError::InvalidAddress(s.to_string()))?;
        let raw: [u8; 20] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidAddress(s.to_string()))?;
        Ok(Self(raw))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

/// Token id of a realm, kept as the decimal string the ledger uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RealmId(String);

impl RealmId {
    /// Parse a user-supplied id. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentityError::InvalidRealmId(raw.to_string()));
        }
        // Range check: anything past 2^256 is not a token id.
        U256::from_dec_str(trimmed).map_err(|_| IdentityError::InvalidRealmId(raw.to_string()))?;
        Ok(Self(trimmed.to_string()))
    }

    /// The decimal string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as a ledger integer.
    pub fn to_u256(&self) -> U256 {
        // Validated in `parse`.
        U256::from_dec_str(&self.0).unwrap_or_default()
    }
}

impl FromStr for RealmId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// REALM
// =============================================================================

/// A geographical feature slot on a realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Display name of the feature.
    pub feature: String,
    /// Ledger id of the feature.
    pub feature_id: u64,
}

/// A realm as recorded on the realm contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realm {
    /// Token id.
    pub id: String,
    /// Name chosen at mint time.
    pub name: String,
    /// Current owner.
    pub owner: Address,
    /// Partner flag as stored on the ledger.
    pub partner: bool,
    /// Land size in square miles.
    pub size: u64,
    /// Creation time (ms).
    pub created_at: u64,
    /// End of the terraform restriction (ms), or the never-restricted sentinel.
    pub terraform_time: u64,
    /// Cities built so far.
    pub cities: u64,
    /// Feature slots in ledger order.
    pub features: Vec<Feature>,
}

// =============================================================================
// ECONOMY
// =============================================================================

/// One named resource balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name ("Gold", "Food", ...).
    pub name: String,
    /// Current balance.
    pub value: u64,
    /// Accrual per turn, for the resources that accrue.
    pub per_turn: Option<u64>,
}

/// Resource balances of one realm, in ledger order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSet {
    /// Balances.
    pub resources: Vec<Resource>,
}

impl ResourceSet {
    /// Look a resource up by name.
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// Action timers and the gold balance they are compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timers {
    /// Earliest collect time (ms).
    pub collect_time: u64,
    /// End of the terraform restriction (ms).
    pub terraform_time: u64,
    /// Earliest next city build (ms).
    pub city_build_time: u64,
    /// Gold balance.
    pub gold: u64,
    /// Cities already built.
    pub cities: u64,
    /// Gold needed for the next city.
    pub next_city_cost: u64,
}

impl Timers {
    /// Build a timer snapshot, deriving the next city cost.
    pub fn new(
        collect_time: u64,
        terraform_time: u64,
        city_build_time: u64,
        gold: u64,
        cities: u64,
    ) -> Self {
        Self {
            collect_time,
            terraform_time,
            city_build_time,
            gold,
            cities,
            next_city_cost: Self::next_city_cost(cities),
        }
    }

    /// Gold cost of the next city: free for the first, then 50 + 2 per city.
    pub fn next_city_cost(cities: u64) -> u64 {
        if cities == 0 {
            0
        } else {
            cities.saturating_mul(2).saturating_add(50)
        }
    }
}

/// Resource requirement to unlock another build slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainSlot {
    /// Resource name.
    pub name: String,
    /// Progress as "have/need"; "0/0" when no slot can be gained.
    pub value: String,
}

impl GainSlot {
    /// Whether another slot can be gained at all.
    pub fn is_available(&self) -> bool {
        self.value != "0/0"
    }
}

/// Build queue of one realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildQueue {
    /// Free slots right now.
    pub queue_available: u64,
    /// Total slots.
    pub queue_total: u64,
    /// When the next occupied slot frees up (ms).
    pub next_free_slot_time: u64,
    /// Requirement for one more slot.
    pub gain_slot: GainSlot,
}

/// Farming view of one realm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farms {
    /// Resources produced by farms.
    pub resources: Vec<Resource>,
    /// Farm counts per farm kind.
    pub farms: Vec<Resource>,
}
