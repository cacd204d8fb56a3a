//! # Domain Invariants
//!
//! Constants and predicates every workflow agrees on.

use shared_types::{Address, RealmId};

/// Terraform timer value meaning "never restricted". Realms that were never
/// terraformed carry this instead of a real timestamp.
pub const SENTINEL_NEVER_RESTRICTED_MS: u64 = 1000;

/// Number of feature slots that can be terraformed.
pub const TERRAFORMABLE_SLOTS: usize = 3;

/// Ledger timestamps are seconds; the engine works in milliseconds.
pub const MS_PER_SECOND: u64 = 1000;

/// Convert a ledger timestamp to milliseconds.
pub fn seconds_to_ms(seconds: u64) -> u64 {
    seconds.saturating_mul(MS_PER_SECOND)
}

/// Strict "now is past t" comparison used by every timer rule.
pub fn is_after(now_ms: u64, t_ms: u64) -> bool {
    now_ms > t_ms
}

/// Invariant: terraform is allowed once the restriction has lapsed, or when
/// the timer holds the never-restricted sentinel.
pub fn invariant_terraform_allowed(terraform_time_ms: u64, now_ms: u64) -> bool {
    terraform_time_ms == SENTINEL_NEVER_RESTRICTED_MS || is_after(now_ms, terraform_time_ms)
}

/// Invariant: a mint form may be submitted only with a nonzero numeric id, a
/// non-empty name and (when required) a connected account.
pub fn invariant_mint_fields(
    id: &str,
    name: &str,
    account: Option<&Address>,
    require_account: bool,
) -> bool {
    RealmId::parse(id).map_or(false, |id| !id.to_u256().is_zero())
        && !name.trim().is_empty()
        && (!require_account || account.is_some())
}
