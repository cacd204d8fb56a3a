//! # Shared Types Crate
//!
//! Ledger-derived entities and network identifiers shared by the realm
//! client, the session bus and the test suite.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every value mirrored from the ledger is
//!   defined here, once.
//! - **Normalized Units**: timestamps are milliseconds, counters are plain
//!   integers; conversion from ledger units happens before a value is built.
//! - **Structural Identity**: ids and addresses compare by value, never by
//!   spelling (`0xABC..` equals `0xabc..`).

pub mod chain;
pub mod entities;

pub use chain::{ChainId, Contract};
pub use entities::*;

// Re-export U256 so downstream crates agree on the integer type.
pub use primitive_types::U256;
