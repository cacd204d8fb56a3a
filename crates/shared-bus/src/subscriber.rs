//! # Event Subscriber
//!
//! A filtered view onto the session bus. Events published before the
//! subscription existed are never seen; events that overflow the buffer
//! are counted as missed.

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::events::{EventFilter, SessionEvent};
use crate::publisher::FilterRegistry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Event bus closed")]
    Closed,
}

/// Receives the events accepted by its filter. Unregisters on drop.
pub struct Subscription {
    id: u64,
    receiver: broadcast::Receiver<SessionEvent>,
    filter: EventFilter,
    registry: FilterRegistry,
    missed: u64,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        receiver: broadcast::Receiver<SessionEvent>,
        filter: EventFilter,
        registry: FilterRegistry,
    ) -> Self {
        Self {
            id,
            receiver,
            filter,
            registry,
            missed: 0,
        }
    }

    /// Next matching event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(count)) => self.lagged(count),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<SessionEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(count)) => self.lagged(count),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Every matching event that is already queued.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Events lost to buffer overflow, matching or not.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    fn lagged(&mut self, count: u64) {
        self.missed += count;
        warn!(subscription = self.id, lost = count, "Subscriber lagged");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.id);
        debug!(subscription = self.id, "Unsubscribed");
    }
}
