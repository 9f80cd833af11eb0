use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{AttendanceBoard, AttendanceEntry, BoardKey};
use crate::error::{Error, SyncError};
use crate::feedback::{Category, Feedback};
use crate::store::{bounded, Collection, RecordStore};

/// One entry per roster member; members without a mark become explicit absences
pub fn build_entries<S: AsRef<str>>(
    key: &BoardKey,
    roster: &[S],
    board: &AttendanceBoard,
    recorded_by: &str,
) -> Vec<AttendanceEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(roster.len());
    for member in roster {
        let member_id: &str = member.as_ref();
        if !seen.insert(member_id) {
            continue;
        }
        entries.push(AttendanceEntry {
            member_id: member_id.to_string(),
            class_id: key.class_id.clone(),
            date: key.date,
            status: board.status_of(member_id),
            recorded_by: recorded_by.to_string(),
        });
    }
    entries
}

/// Clears the busy flag on every exit path, including a dropped future
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Writes a full day of attendance for a class in one batch
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn RecordStore>,
    feedback: Feedback,
    timeout: Option<Duration>,
    busy: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RecordStore>, feedback: Feedback, timeout: Option<Duration>) -> Self {
        Self {
            store,
            feedback,
            timeout,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a publish is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Upsert one row per roster member for `(class_id, date)`
    ///
    /// The outcome is always reported through the feedback context as well
    /// as returned. The board itself is never modified.
    pub async fn publish<S: AsRef<str>>(
        &self,
        class_id: &str,
        date: NaiveDate,
        roster: &[S],
        board: &AttendanceBoard,
        recorded_by: &str,
    ) -> Result<(), SyncError> {
        let requested = BoardKey::new(class_id, date);
        let result = self.write(&requested, roster, board, recorded_by).await;

        match &result {
            Ok(count) => {
                log::info!("Published {} attendance rows for {}", count, requested);
                self.feedback.notify("Attendance saved", Category::Success);
            }
            Err(e) => {
                log::error!("Publishing attendance for {} failed: {}", requested, e);
                self.feedback
                    .notify(format!("Failed to save attendance: {}", e), Category::Error);
            }
        }
        result.map(|_| ())
    }

    async fn write<S: AsRef<str>>(
        &self,
        requested: &BoardKey,
        roster: &[S],
        board: &AttendanceBoard,
        recorded_by: &str,
    ) -> Result<usize, SyncError> {
        if board.key() != requested {
            return Err(SyncError::BoardMismatch {
                board: board.key().clone(),
                requested: requested.clone(),
            });
        }
        let _guard = BusyGuard::acquire(&self.busy).ok_or(SyncError::Busy)?;

        let entries = build_entries(requested, roster, board, recorded_by);
        let count = entries.len();
        let records = entries
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::from)?;

        bounded(
            self.timeout,
            self.store.upsert_batch(Collection::Attendance, records),
        )
        .await
        .map_err(|e| match e {
            Error::Timeout(limit) => SyncError::Timeout(limit),
            other => SyncError::Store(other),
        })?;
        Ok(count)
    }
}
