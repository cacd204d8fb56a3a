//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ledger ports.

mod memory_ledger;

pub use memory_ledger::{
    InMemoryLedger, RealmSeed, CITY_COOLDOWN_S, COLLECT_COOLDOWN_S, FARM_COOLDOWN_S,
    TERRAFORM_COOLDOWN_S,
};
