//! Configuration options for the classroll client

use std::time::Duration;

/// What a load does when the active board still has unpublished edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsyncedPolicy {
    /// Replace the board anyway and drop the edits
    Discard,
    /// Refuse to load a different class/date until the edits are published or discarded
    Refuse,
}

/// Configuration options for the classroll client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout, applied to every store call
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,

    /// How long a notification stays visible
    pub notification_ttl: Duration,

    /// How long the success overlay stays visible after its latest trigger
    pub overlay_ttl: Duration,

    /// Label that marks a teacher as not assigned to any class
    pub unassigned_label: String,

    /// Behaviour of a load that would replace unpublished edits
    pub unsynced_policy: UnsyncedPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            notification_ttl: Duration::from_millis(4000),
            overlay_ttl: Duration::from_millis(2200),
            unassigned_label: "Unassigned".to_string(),
            unsynced_policy: UnsyncedPolicy::Discard,
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the notification visibility window
    pub fn with_notification_ttl(mut self, value: Duration) -> Self {
        self.notification_ttl = value;
        self
    }

    /// Set the overlay visibility window
    pub fn with_overlay_ttl(mut self, value: Duration) -> Self {
        self.overlay_ttl = value;
        self
    }

    /// Set the sentinel label for unassigned teachers
    pub fn with_unassigned_label(mut self, value: &str) -> Self {
        self.unassigned_label = value.to_string();
        self
    }

    /// Set the policy for loads over unpublished edits
    pub fn with_unsynced_policy(mut self, value: UnsyncedPolicy) -> Self {
        self.unsynced_policy = value;
        self
    }
}
