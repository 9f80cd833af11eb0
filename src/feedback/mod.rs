//! Ephemeral feedback: self-expiring notifications and the success overlay
//!
//! A [`Feedback`] context is mounted once per administrator session and
//! handed to every component that reports outcomes. Its timers run as
//! detached tasks on the runtime it was mounted on; [`Feedback::unmount`]
//! cancels all of them and clears whatever is still visible.

mod notifications;
mod overlay;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::ClientOptions;
use crate::error::Error;

pub use notifications::{Notification, NotificationId, NotificationQueue};
pub use overlay::{OverlayState, SuccessOverlay};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Error,
    Warning,
    Info,
}

/// Change of visible feedback, broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackEvent {
    Notified(Notification),
    Removed(NotificationId),
    OverlayShown(String),
    OverlayHidden,
}

/// Spawns delayed callbacks that stop firing once the context is unmounted
#[derive(Clone)]
pub(crate) struct Scheduler {
    handle: Handle,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub(crate) fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn schedule<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => callback(),
            }
        });
    }
}

/// Injected feedback channel for one session
#[derive(Clone)]
pub struct Feedback {
    queue: NotificationQueue,
    overlay: SuccessOverlay,
    scheduler: Scheduler,
    events: broadcast::Sender<FeedbackEvent>,
}

impl Feedback {
    /// Mount a feedback context on the current tokio runtime
    pub fn mount(options: &ClientOptions) -> Result<Self, Error> {
        let handle = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let scheduler = Scheduler {
            handle,
            shutdown: CancellationToken::new(),
        };
        let (events, _) = broadcast::channel(64);

        log::debug!("Feedback context mounted");
        Ok(Self {
            queue: NotificationQueue::new(
                options.notification_ttl,
                scheduler.clone(),
                events.clone(),
            ),
            overlay: SuccessOverlay::new(options.overlay_ttl, scheduler.clone(), events.clone()),
            scheduler,
            events,
        })
    }

    /// Cancel every pending timer and clear visible feedback
    pub fn unmount(&self) {
        if self.scheduler.is_closed() {
            return;
        }
        self.scheduler.shutdown.cancel();
        self.queue.clear();
        self.overlay.hide();
        log::debug!("Feedback context unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        !self.scheduler.is_closed()
    }

    /// Show a notification; never fails and never blocks
    pub fn notify(&self, message: impl Into<String>, category: Category) -> NotificationId {
        self.queue.enqueue(message, category)
    }

    /// Remove a notification before it expires
    pub fn dismiss(&self, id: NotificationId) {
        self.queue.dismiss(id);
    }

    /// Visible notifications, oldest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.queue.snapshot()
    }

    /// Show the success overlay
    pub fn celebrate(&self, message: impl Into<String>) {
        self.overlay.trigger(message);
    }

    pub fn overlay(&self) -> OverlayState {
        self.overlay.state()
    }

    /// Observe feedback changes
    pub fn subscribe(&self) -> broadcast::Receiver<FeedbackEvent> {
        self.events.subscribe()
    }
}
