//! Per-key cache state.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use tokio::sync::watch;

use crate::domain::{ClientError, EntityValue};

/// Outcome of one fetch.
pub type FetchResult = Result<EntityValue, ClientError>;

/// Produces a fresh fetch future each time an entry needs (re)loading.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

/// Wrap an async closure as a [`Fetcher`].
pub fn fetcher<F, Fut>(f: F) -> Fetcher
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Resolution state of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Never fetched (or fetching is disabled).
    Idle,
    /// First fetch in flight, no value yet.
    Loading,
    /// Last fetch succeeded.
    Success(EntityValue),
    /// Last fetch failed.
    Error(ClientError),
}

/// What a view observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// Latest resolution.
    pub status: EntryStatus,
    /// A fetch is running. A refetch keeps the previous `Success` visible.
    pub is_fetching: bool,
    /// Invalidated and not yet refetched.
    pub is_stale: bool,
    /// Number of resolutions so far.
    pub version: u64,
}

impl EntrySnapshot {
    pub(crate) fn idle() -> Self {
        Self {
            status: EntryStatus::Idle,
            is_fetching: false,
            is_stale: false,
            version: 0,
        }
    }

    /// The value, when the last fetch succeeded.
    pub fn value(&self) -> Option<&EntityValue> {
        match &self.status {
            EntryStatus::Success(value) => Some(value),
            _ => None,
        }
    }

    /// The error, when the last fetch failed.
    pub fn error(&self) -> Option<&ClientError> {
        match &self.status {
            EntryStatus::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Resolved and not being replaced.
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && !self.is_stale
    }
}

pub(crate) struct Entry {
    pub(crate) epoch: u64,
    pub(crate) status: EntryStatus,
    pub(crate) in_flight: bool,
    pub(crate) stale: bool,
    pub(crate) refetch_queued: bool,
    pub(crate) subscribers: usize,
    /// Views opened with fetching enabled; only these trigger refetches.
    pub(crate) enabled_subscribers: usize,
    pub(crate) version: u64,
    pub(crate) fetcher: Option<Fetcher>,
    pub(crate) tx: watch::Sender<EntrySnapshot>,
}

impl Entry {
    pub(crate) fn new(epoch: u64) -> Self {
        let (tx, _) = watch::channel(EntrySnapshot::idle());
        Self {
            epoch,
            status: EntryStatus::Idle,
            in_flight: false,
            stale: false,
            refetch_queued: false,
            subscribers: 0,
            enabled_subscribers: 0,
            version: 0,
            fetcher: None,
            tx,
        }
    }

    /// Idle, failed and stale entries refetch; loaded or loading ones don't.
    pub(crate) fn needs_fetch(&self) -> bool {
        if self.in_flight {
            return false;
        }
        self.stale || !matches!(self.status, EntryStatus::Success(_))
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            status: self.status.clone(),
            is_fetching: self.in_flight,
            is_stale: self.stale,
            version: self.version,
        }
    }

    pub(crate) fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }

    pub(crate) fn wants_refetch(&self) -> bool {
        self.enabled_subscribers > 0
    }

    pub(crate) fn is_evictable(&self) -> bool {
        self.subscribers == 0 && !self.in_flight
    }
}
