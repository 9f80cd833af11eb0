use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{Category, FeedbackEvent, Scheduler};

/// Identifier of one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Uuid);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub category: Category,
    pub created_at: DateTime<Utc>,
}

/// Independent, self-expiring notifications
///
/// Every entry gets its own removal timer started at enqueue time. There is
/// no cap and no deduplication; identical messages are separate entries.
#[derive(Clone)]
pub struct NotificationQueue {
    entries: Arc<Mutex<Vec<Notification>>>,
    ttl: Duration,
    scheduler: Scheduler,
    events: broadcast::Sender<FeedbackEvent>,
}

impl NotificationQueue {
    pub(crate) fn new(
        ttl: Duration,
        scheduler: Scheduler,
        events: broadcast::Sender<FeedbackEvent>,
    ) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            ttl,
            scheduler,
            events,
        }
    }

    /// Append a notification and schedule its removal
    pub fn enqueue(&self, message: impl Into<String>, category: Category) -> NotificationId {
        let notification = Notification {
            id: NotificationId(Uuid::new_v4()),
            message: message.into(),
            category,
            created_at: Utc::now(),
        };
        let id = notification.id;

        if self.scheduler.is_closed() {
            log::debug!(
                "Dropping {:?} notification after unmount: {}",
                category,
                notification.message
            );
            return id;
        }

        log::debug!("Notification {} ({:?}): {}", id, category, notification.message);
        self.entries.lock().push(notification.clone());
        let _ = self.events.send(FeedbackEvent::Notified(notification));

        let queue = self.clone();
        self.scheduler.schedule(self.ttl, move || {
            queue.remove(id);
        });
        id
    }

    /// Remove immediately; unknown ids are ignored
    pub fn dismiss(&self, id: NotificationId) {
        self.remove(id);
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.entries.lock().clone()
    }

    pub(crate) fn clear(&self) {
        let removed: Vec<_> = self.entries.lock().drain(..).map(|n| n.id).collect();
        for id in removed {
            let _ = self.events.send(FeedbackEvent::Removed(id));
        }
    }

    fn remove(&self, id: NotificationId) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.iter().position(|n| n.id == id) {
                Some(index) => {
                    entries.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            let _ = self.events.send(FeedbackEvent::Removed(id));
        }
        removed
    }
}
