//! # Session Events
//!
//! Every event that flows through the session bus: wallet and network
//! signals, ledger events, user notifications and workflow transitions.

use serde::{Deserialize, Serialize};
use shared_types::Address;
use uuid::Uuid;

/// All events that can be published to the session bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    // =========================================================================
    // WALLET
    // =========================================================================
    /// The connected account changed (or was disconnected).
    AccountChanged {
        /// New account, `None` when disconnected.
        account: Option<Address>,
    },

    // =========================================================================
    // NETWORK
    // =========================================================================
    /// The wallet switched networks.
    ChainChanged {
        /// Hex chain id as reported by the wallet.
        chain_id: String,
    },

    // =========================================================================
    // LEDGER
    // =========================================================================
    /// A `RealmCreated` event was observed on the realm contract.
    RealmCreated {
        /// Id of the new realm.
        realm_id: String,
    },

    // =========================================================================
    // USER FEEDBACK
    // =========================================================================
    /// A toast-style notification for the user.
    Notification(Notification),

    // =========================================================================
    // WORKFLOWS
    // =========================================================================
    /// A workflow moved between states.
    WorkflowTransition {
        /// Workflow name ("mint", "terraform", "collect", ...).
        workflow: String,
        /// Realm the workflow is scoped to, if any.
        realm_id: Option<String>,
        /// Previous state.
        from: String,
        /// New state.
        to: String,
    },

    // =========================================================================
    // SESSION
    // =========================================================================
    /// The session was torn down.
    SessionEnded,
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// An action completed.
    Success,
    /// An action failed.
    Error,
}

/// User-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id, lets a renderer deduplicate.
    pub id: Uuid,
    /// Severity.
    pub severity: Severity,
    /// Title line.
    pub title: String,
    /// Humanized detail, if any.
    pub description: Option<String>,
    /// How long the notification stays visible (ms).
    pub duration_ms: u64,
}

impl Notification {
    /// A success notification with no detail.
    #[must_use]
    pub fn success(title: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity: Severity::Success,
            title: title.into(),
            description: None,
            duration_ms,
        }
    }

    /// An error notification carrying a humanized description.
    #[must_use]
    pub fn error(title: impl Into<String>, description: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity: Severity::Error,
            title: title.into(),
            description: Some(description.into()),
            duration_ms,
        }
    }
}

impl SessionEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::AccountChanged { .. } => EventTopic::Wallet,
            Self::ChainChanged { .. } => EventTopic::Network,
            Self::RealmCreated { .. } => EventTopic::Ledger,
            Self::Notification(_) => EventTopic::Notifications,
            Self::WorkflowTransition { .. } => EventTopic::Workflow,
            Self::SessionEnded => EventTopic::Session,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Account signals.
    Wallet,
    /// Network signals.
    Network,
    /// Contract events.
    Ledger,
    /// User notifications.
    Notifications,
    /// Workflow state changes.
    Workflow,
    /// Session lifecycle.
    Session,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &SessionEvent) -> bool {
        self.accepts(event.topic())
    }

    /// Whether events of `topic` pass this filter.
    #[must_use]
    pub fn accepts(&self, topic: EventTopic) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic_mapping() {
        let event = SessionEvent::ChainChanged {
            chain_id: "0x4".into(),
        };
        assert_eq!(event.topic(), EventTopic::Network);
        assert_eq!(SessionEvent::SessionEnded.topic(), EventTopic::Session);
    }

    #[test]
    fn test_filter_all() {
        let filter = EventFilter::all();
        assert!(filter.matches(&SessionEvent::AccountChanged { account: None }));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Notifications]);

        let note = SessionEvent::Notification(Notification::success("done", 7000));
        assert!(filter.matches(&note));

        let wallet = SessionEvent::AccountChanged { account: None };
        assert!(!filter.matches(&wallet));
    }

    #[test]
    fn test_error_notification_carries_description() {
        let note = Notification::error("Error", "user rejected", 7000);
        assert_eq!(note.severity, Severity::Error);
        assert_eq!(note.description.as_deref(), Some("user rejected"));
    }
}
