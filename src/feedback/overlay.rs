use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::{FeedbackEvent, Scheduler};

/// What the overlay currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayState {
    pub message: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Default)]
struct Inner {
    message: Option<String>,
    // bumped by every trigger and hide; a timer only hides its own generation
    generation: u64,
}

/// Singleton high-salience success surface
#[derive(Clone)]
pub struct SuccessOverlay {
    inner: Arc<Mutex<Inner>>,
    ttl: Duration,
    scheduler: Scheduler,
    events: broadcast::Sender<FeedbackEvent>,
}

impl SuccessOverlay {
    pub(crate) fn new(
        ttl: Duration,
        scheduler: Scheduler,
        events: broadcast::Sender<FeedbackEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            ttl,
            scheduler,
            events,
        }
    }

    /// Show `message`, superseding any pending hide
    pub fn trigger(&self, message: impl Into<String>) {
        let message = message.into();
        if self.scheduler.is_closed() {
            log::debug!("Dropping overlay after unmount: {}", message);
            return;
        }

        let generation = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.message = Some(message.clone());
            inner.generation
        };
        let _ = self.events.send(FeedbackEvent::OverlayShown(message));

        let overlay = self.clone();
        self.scheduler.schedule(self.ttl, move || overlay.expire(generation));
    }

    /// Hide now and invalidate the pending timer
    pub fn hide(&self) {
        let was_visible = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.message.take().is_some()
        };
        if was_visible {
            let _ = self.events.send(FeedbackEvent::OverlayHidden);
        }
    }

    pub fn state(&self) -> OverlayState {
        let inner = self.inner.lock();
        OverlayState {
            message: inner.message.clone(),
            visible: inner.message.is_some(),
        }
    }

    fn expire(&self, generation: u64) {
        let hidden = {
            let mut inner = self.inner.lock();
            inner.generation == generation && inner.message.take().is_some()
        };
        if hidden {
            let _ = self.events.send(FeedbackEvent::OverlayHidden);
        }
    }
}
