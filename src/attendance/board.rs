use std::collections::HashMap;

use super::{AttendanceEntry, AttendanceStatus, BoardKey};

/// In-memory attendance for one (class, date)
///
/// `Absent` is never stored: a member missing from the map is absent, and
/// setting a member to absent removes it. Read statuses through
/// [`AttendanceBoard::status_of`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceBoard {
    key: BoardKey,
    statuses: HashMap<String, AttendanceStatus>,
}

impl AttendanceBoard {
    /// An empty board, everyone absent
    pub fn new(key: BoardKey) -> Self {
        Self {
            key,
            statuses: HashMap::new(),
        }
    }

    /// Fold stored rows into a board; rows for another class or date are ignored
    pub fn from_entries<I>(key: BoardKey, entries: I) -> Self
    where
        I: IntoIterator<Item = AttendanceEntry>,
    {
        let mut board = Self::new(key);
        for entry in entries {
            if entry.class_id == board.key.class_id && entry.date == board.key.date {
                board.set(entry.member_id, entry.status);
            } else {
                log::warn!("Ignoring attendance row for {} on {}", entry.key(), board.key);
            }
        }
        board
    }

    pub fn key(&self) -> &BoardKey {
        &self.key
    }

    pub fn status_of(&self, member_id: &str) -> AttendanceStatus {
        self.statuses.get(member_id).copied().unwrap_or_default()
    }

    /// Same status clears back to absent, a different one replaces it
    pub fn toggle(&self, member_id: &str, requested: AttendanceStatus) -> Self {
        let next = if self.status_of(member_id) == requested {
            AttendanceStatus::Absent
        } else {
            requested
        };
        let mut board = self.clone();
        board.set(member_id.to_string(), next);
        board
    }

    /// Members with a non-absent status
    pub fn marked(&self) -> impl Iterator<Item = (&str, AttendanceStatus)> {
        self.statuses.iter().map(|(m, s)| (m.as_str(), *s))
    }

    pub fn marked_count(&self) -> usize {
        self.statuses.len()
    }

    fn set(&mut self, member_id: String, status: AttendanceStatus) {
        if status == AttendanceStatus::Absent {
            self.statuses.remove(&member_id);
        } else {
            self.statuses.insert(member_id, status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use AttendanceStatus::*;

    fn key() -> BoardKey {
        BoardKey::new("C1", NaiveDate::from_ymd_opt(2026, 10, 14).unwrap())
    }

    fn entry(member: &str, class_id: &str, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            member_id: member.into(),
            class_id: class_id.into(),
            date: key().date,
            status,
            recorded_by: "admin".into(),
        }
    }

    #[test]
    fn toggle_once_sets_and_twice_clears() {
        for status in [Present, Late, Excused] {
            let board = AttendanceBoard::new(key());
            let once = board.toggle("A", status);
            assert_eq!(once.status_of("A"), status);

            let twice = once.toggle("A", status);
            assert_eq!(twice.status_of("A"), Absent);
            assert_ne!(twice, once);
            assert_eq!(twice, board);
        }
    }

    #[test]
    fn toggle_to_other_status_replaces() {
        let board = AttendanceBoard::new(key()).toggle("A", Present);
        let board = board.toggle("A", Late).toggle("B", Excused);
        assert_eq!(board.status_of("A"), Late);
        assert_eq!(board.marked_count(), 2);

        let mut marked: Vec<_> = board.marked().collect();
        marked.sort_by_key(|(member, _)| *member);
        assert_eq!(marked, vec![("A", Late), ("B", Excused)]);
    }

    #[test]
    fn toggle_leaves_the_original_untouched() {
        let board = AttendanceBoard::new(key());
        let _ = board.toggle("A", Present);
        assert_eq!(board.status_of("A"), Absent);
    }

    #[test]
    fn toggling_absent_on_an_absent_member_stays_absent() {
        let board = AttendanceBoard::new(key()).toggle("A", Absent);
        assert_eq!(board.status_of("A"), Absent);
        assert_eq!(board.marked_count(), 0);
    }

    #[test]
    fn unknown_members_read_as_absent() {
        let board = AttendanceBoard::from_entries(key(), vec![entry("A", "C1", Present)]);
        assert_eq!(board.status_of("A"), Present);
        assert_eq!(board.status_of("B"), Absent);
        assert_eq!(board.status_of(""), Absent);
    }

    #[test]
    fn from_entries_skips_absent_rows_and_foreign_keys() {
        let board = AttendanceBoard::from_entries(
            key(),
            vec![
                entry("A", "C1", Late),
                entry("B", "C1", Absent),
                entry("C", "C2", Present),
            ],
        );
        assert_eq!(board.marked_count(), 1);
        assert_eq!(board.status_of("C"), Absent);
        assert_eq!(board, AttendanceBoard::new(key()).toggle("A", Late));
    }
}
