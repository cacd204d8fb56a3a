//! # Shared Bus - Session Event Bus
//!
//! In-process broadcast bus connecting the realm client's moving parts.
//!
//! ## Rules
//!
//! - Foreign callbacks (wallet, provider) never touch engine state directly;
//!   they publish or enqueue, and the session loop reacts.
//! - Workflows report outcomes to the user only through `Notification`
//!   events.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Workflow    │                    │  Renderer    │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, Notification, SessionEvent, Severity};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
