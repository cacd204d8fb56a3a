//! # Realm Client
//!
//! Client-side engine for an on-chain realm game: a read-through cache over
//! ledger state, eligibility derived from ledger timers and the block clock,
//! and the state machines behind every user action.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Responsibilities
//!
//! | Concern | Where |
//! |---------|-------|
//! | Coalesced, invalidatable ledger reads | `cache`, `queries` |
//! | Collect / terraform / city eligibility | `domain::eligibility` |
//! | Mint, terraform and single-shot actions | `workflows` |
//! | Wallet and network signals | `application::RealmSession` |
//! | Intent-driven prefetch | `prefetch` |
//!
//! ## Module Structure
//!
//! ```text
//! realm-client/
//! ├── domain/          # Keys, entities, eligibility, block clock, errors
//! ├── ports/           # ChainReader / ChainWriter / PendingTransaction
//! ├── adapters/        # InMemoryLedger
//! ├── cache/           # EntityCache, CacheView
//! ├── queries.rs       # Key families and the reads that resolve them
//! ├── workflows/       # Mint, terraform and action state machines
//! ├── prefetch.rs      # Prefetcher
//! ├── application/     # RealmSession
//! └── config.rs        # ClientConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod ports;
pub mod prefetch;
pub mod queries;
pub mod workflows;

// Re-exports
pub use adapters::{InMemoryLedger, RealmSeed};
pub use application::{RealmSession, SessionCommand, SignalHandle};
pub use cache::{CacheView, EntityCache, EntrySnapshot, EntryStatus};
pub use config::ClientConfig;
pub use domain::{
    humanize, invariant_mint_fields, invariant_terraform_allowed, BlockClock, CacheKey,
    ClientError, ConfigError, Countdown, Eligibility, EntityValue, FeatureSlot, KeyFilter,
    LedgerError, QueueEligibility, SENTINEL_NEVER_RESTRICTED_MS, TERRAFORMABLE_SLOTS,
    UNKNOWN_ERROR_MESSAGE,
};
pub use ports::{ChainReader, ChainWriter, LedgerValue, PendingTransaction, ReadCall, WriteCall};
pub use prefetch::Prefetcher;
pub use queries::{decode_revert_name, RealmQueries, UNKNOWN_REALM_NAME};
pub use workflows::{
    ActionKind, ActionOutcome, ActionSnapshot, ActionState, ActionWorkflow, FormState,
    MintSnapshot, MintWorkflow, Ownership, TerraformEligibility, TerraformSnapshot,
    TerraformWorkflow,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
