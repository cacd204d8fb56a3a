//! # Derived Eligibility
//!
//! Pure functions over ledger timers and the block clock. Every flag is false
//! while either input is unknown; callers pass only successfully resolved
//! values.

use serde::{Deserialize, Serialize};
use shared_types::{BuildQueue, Timers};

use super::invariants::{invariant_terraform_allowed, is_after, SENTINEL_NEVER_RESTRICTED_MS};

/// Which realm actions may be attempted right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    /// Resources can be collected.
    pub can_collect: bool,
    /// A feature can be terraformed.
    pub can_terraform: bool,
    /// Gold covers the next city.
    pub has_enough_gold_for_city: bool,
    /// The city cooldown has elapsed.
    pub has_waited_enough_for_city: bool,
    /// Both city conditions hold.
    pub can_build_city: bool,
}

impl Eligibility {
    /// Derive the flags from timers and the current block time (ms).
    pub fn derive(timers: Option<&Timers>, now_ms: Option<u64>) -> Self {
        let (Some(timers), Some(now)) = (timers, now_ms) else {
            return Self::default();
        };

        let has_enough_gold_for_city = timers.gold >= timers.next_city_cost;
        let has_waited_enough_for_city = is_after(now, timers.city_build_time);

        Self {
            can_collect: is_after(now, timers.collect_time),
            can_terraform: invariant_terraform_allowed(timers.terraform_time, now),
            has_enough_gold_for_city,
            has_waited_enough_for_city,
            can_build_city: has_enough_gold_for_city && has_waited_enough_for_city,
        }
    }
}

/// Build-queue flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEligibility {
    /// A farm can be queued: a slot is free, or the next one has freed up.
    pub can_build_farm: bool,
    /// Another queue slot can be gained.
    pub can_gain_slot: bool,
}

impl QueueEligibility {
    /// Derive the flags from the queue and the current block time (ms).
    pub fn derive(queue: Option<&BuildQueue>, now_ms: Option<u64>) -> Self {
        let (Some(queue), Some(now)) = (queue, now_ms) else {
            return Self::default();
        };

        Self {
            can_build_farm: queue.queue_available > 0 || is_after(now, queue.next_free_slot_time),
            can_gain_slot: queue.gain_slot.is_available(),
        }
    }
}

/// Remaining waits, for countdown displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    /// Until collect opens (ms).
    pub collect_in_ms: u64,
    /// Until terraform opens (ms); zero for never-restricted realms.
    pub terraform_in_ms: u64,
    /// Until the city cooldown ends (ms).
    pub city_in_ms: u64,
    /// Gold still missing for the next city.
    pub gold_shortfall: u64,
}

impl Countdown {
    /// Derive countdowns; `None` while either input is unknown.
    pub fn derive(timers: Option<&Timers>, now_ms: Option<u64>) -> Option<Self> {
        let (timers, now) = (timers?, now_ms?);
        let terraform_in_ms = if timers.terraform_time == SENTINEL_NEVER_RESTRICTED_MS {
            0
        } else {
            ms_until(timers.terraform_time, now)
        };

        Some(Self {
            collect_in_ms: ms_until(timers.collect_time, now),
            terraform_in_ms,
            city_in_ms: ms_until(timers.city_build_time, now),
            gold_shortfall: gold_shortfall(timers),
        })
    }
}

/// `max(0, t - now)`
pub fn ms_until(t_ms: u64, now_ms: u64) -> u64 {
    t_ms.saturating_sub(now_ms)
}

/// `max(0, nextCityCost - gold)`
pub fn gold_shortfall(timers: &Timers) -> u64 {
    timers.next_city_cost.saturating_sub(timers.gold)
}
