//! # Event Publisher
//!
//! Publishing side of the session bus. The bus keeps a registry of live
//! subscription filters so a publisher learns how many subscribers actually
//! wanted an event, not just how many receivers the channel has.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::events::{EventFilter, EventTopic, SessionEvent};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Live filters by subscription id.
pub(crate) type FilterRegistry = Arc<Mutex<HashMap<u64, EventFilter>>>;

/// Publishing side of the bus.
///
/// Workflows and the session loop only see this trait, so tests can
/// substitute a recording publisher.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// Returns the number of live subscriptions whose filter accepts it.
    async fn publish(&self, event: SessionEvent) -> usize;

    /// Total events published so far.
    fn events_published(&self) -> u64;
}

/// In-process session bus over `tokio::sync::broadcast`.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<SessionEvent>,
    filters: FilterRegistry,
    next_id: AtomicU64,
    events_published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A bus whose subscribers lag after `capacity` unread events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            filters: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching `filter`.
    ///
    /// Only events published after this call are delivered.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.filters.lock().insert(id, filter.clone());
        debug!(subscription = id, topics = ?filter.topics, "Subscribed");
        Subscription::new(id, self.sender.subscribe(), filter, self.filters.clone())
    }

    /// Live subscriptions of any kind.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.filters.lock().len()
    }

    /// Live subscriptions that would receive events of `topic`.
    #[must_use]
    pub fn listeners(&self, topic: EventTopic) -> usize {
        self.filters
            .lock()
            .values()
            .filter(|filter| filter.accepts(topic))
            .count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: SessionEvent) -> usize {
        let topic = event.topic();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let interested = self.listeners(topic);
        if interested == 0 {
            // A headless session has nobody listening for notifications.
            trace!(?topic, "No listeners");
        }
        // Send even when nobody matches; the broadcast buffer is shared.
        let _ = self.sender.send(event);
        debug!(?topic, interested, "Event published");
        interested
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
