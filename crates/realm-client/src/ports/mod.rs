//! # Ports Module
//!
//! Hexagonal architecture ports. The engine only depends outward, on the
//! ledger and the wallet.

pub mod outbound;

pub use outbound::*;
