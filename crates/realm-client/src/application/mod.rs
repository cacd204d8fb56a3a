//! # Application Module
//!
//! The session service wiring the cache, queries and workflows to the
//! outbound ports.

pub mod service;

pub use service::{RealmSession, SessionCommand, SignalHandle};
