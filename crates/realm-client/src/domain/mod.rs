//! # Domain Module
//!
//! Core types for the realm client: cache keys and values, errors, and the
//! pure eligibility rules.

pub mod clock;
pub mod eligibility;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use clock::*;
pub use eligibility::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
