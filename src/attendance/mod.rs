//! Per-class, per-day attendance: the board, its session and the sync engine

mod board;
mod session;
mod sync;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use board::AttendanceBoard;
pub use session::{AttendanceSession, LoadOutcome};
pub use sync::{build_entries, SyncEngine};

/// Attendance of one member for one class and day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Excused,
    #[default]
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (class, date) pair a board is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardKey {
    pub class_id: String,
    pub date: NaiveDate,
}

impl BoardKey {
    pub fn new(class_id: &str, date: NaiveDate) -> Self {
        Self {
            class_id: class_id.to_string(),
            date,
        }
    }
}

impl fmt::Display for BoardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {} on {}", self.class_id, self.date)
    }
}

/// One stored attendance row, identified by (member, class, date)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub member_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub recorded_by: String,
}

impl AttendanceEntry {
    pub fn key(&self) -> BoardKey {
        BoardKey::new(&self.class_id, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_uses_store_column_names() {
        let entry = AttendanceEntry {
            member_id: "A".into(),
            class_id: "C1".into(),
            date: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            status: AttendanceStatus::Late,
            recorded_by: "admin".into(),
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "member_id": "A",
                "class_id": "C1",
                "date": "2026-10-14",
                "status": "late",
                "recorded_by": "admin"
            })
        );
    }

    #[test]
    fn absent_is_the_default_status() {
        assert_eq!(AttendanceStatus::default(), AttendanceStatus::Absent);
    }
}
