//! # Realm Client Test Suite
//!
//! Cross-component scenarios: session signals, cache behaviour and the
//! action workflows, all driven through `InMemoryLedger`.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs        # Seeded ledger, session start, notification helpers
//! └── integration/
//!     ├── cache_flows.rs     # Coalescing, lazy invalidation, name decoding, clock
//!     ├── session_flows.rs   # Account / chain signals, ledger events
//!     └── workflow_flows.rs  # Mint, terraform and action scenarios
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p realm-tests
//! RUST_LOG=realm_client=debug cargo test -p realm-tests integration::workflow_flows
//! ```

use tracing_subscriber::EnvFilter;

pub mod fixtures;
pub mod integration;

/// Install a test-friendly subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
