//! # Integration Scenarios
//!
//! Each module drives a full `RealmSession` against `InMemoryLedger`.

pub mod cache_flows;
pub mod session_flows;
pub mod workflow_flows;
