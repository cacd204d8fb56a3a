//! # Cache Module
//!
//! Keyed, read-through cache of ledger entities with subscriber tracking and
//! prefix invalidation.

mod entry;
mod store;
mod view;

pub use entry::{fetcher, EntrySnapshot, EntryStatus, FetchResult, Fetcher};
pub use store::EntityCache;
pub use view::CacheView;
