use chrono::NaiveDate;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use super::{AttendanceBoard, AttendanceEntry, AttendanceStatus, BoardKey, SyncEngine};
use crate::config::{ClientOptions, UnsyncedPolicy};
use crate::error::{LoadError, SyncError};
use crate::feedback::{Category, Feedback};
use crate::store::{bounded, fetch_all, Collection, Filter, RecordStore};

/// Result of a board load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The fetched board is now the active one
    Applied(AttendanceBoard),
    /// A later load was issued before this one resolved; its result was dropped
    Superseded,
}

#[derive(Debug, Default)]
struct State {
    board: Option<AttendanceBoard>,
    dirty: bool,
    // bumped on every load and toggle, so a publish can tell if it wrote the current board
    revision: u64,
    // generation of the most recently issued load; only that load may apply
    issued: u64,
}

/// The active attendance board of one administrator session
pub struct AttendanceSession {
    store: Arc<dyn RecordStore>,
    feedback: Feedback,
    engine: SyncEngine,
    timeout: Option<Duration>,
    policy: UnsyncedPolicy,
    state: Mutex<State>,
}

impl AttendanceSession {
    pub fn new(store: Arc<dyn RecordStore>, feedback: Feedback, options: &ClientOptions) -> Self {
        let engine = SyncEngine::new(store.clone(), feedback.clone(), options.request_timeout);
        Self {
            store,
            feedback,
            engine,
            timeout: options.request_timeout,
            policy: options.unsynced_policy,
            state: Mutex::new(State::default()),
        }
    }

    /// Replace the active board with the stored attendance of `(class_id, date)`
    ///
    /// Only the most recently issued load is ever applied; an earlier one that
    /// resolves late returns [`LoadOutcome::Superseded`].
    pub async fn load(&self, class_id: &str, date: NaiveDate) -> Result<LoadOutcome, LoadError> {
        let key = BoardKey::new(class_id, date);
        let issued = {
            let mut state = self.state.lock();
            match self.refusal(&state, &key) {
                Some(current) => Err(current),
                None => {
                    state.issued += 1;
                    Ok(state.issued)
                }
            }
        };
        let generation = issued.map_err(|current| self.refuse(&key, current))?;
        log::debug!("Loading attendance for {} (generation {})", key, generation);

        let filter = Filter::new().eq("class_id", class_id).eq("date", date);
        let fetched = bounded(
            self.timeout,
            fetch_all::<AttendanceEntry>(self.store.as_ref(), Collection::Attendance, &filter),
        )
        .await;

        let entries = match fetched {
            Ok(entries) => entries,
            Err(e) => {
                if self.state.lock().issued != generation {
                    log::warn!("Superseded load for {} failed: {}", key, e);
                    return Ok(LoadOutcome::Superseded);
                }
                log::error!("Loading attendance for {} failed: {}", key, e);
                self.feedback
                    .notify(format!("Failed to load attendance: {}", e), Category::Error);
                return Err(LoadError::Store(e));
            }
        };

        let board = AttendanceBoard::from_entries(key.clone(), entries);
        // staleness check and apply share one critical section
        let applied = {
            let mut state = self.state.lock();
            if state.issued != generation {
                Ok(false)
            } else if let Some(current) = self.refusal(&state, &key) {
                Err(current)
            } else {
                if state.dirty {
                    log::warn!("Discarding unsynced attendance edits");
                }
                state.board = Some(board.clone());
                state.dirty = false;
                state.revision += 1;
                Ok(true)
            }
        };

        match applied {
            Ok(true) => Ok(LoadOutcome::Applied(board)),
            Ok(false) => {
                log::debug!("Dropping superseded load for {}", key);
                Ok(LoadOutcome::Superseded)
            }
            Err(current) => Err(self.refuse(&key, current)),
        }
    }

    /// Toggle a member on the active board; `None` when no board is loaded
    pub fn toggle(&self, member_id: &str, status: AttendanceStatus) -> Option<AttendanceStatus> {
        let mut state = self.state.lock();
        let Some(board) = state.board.as_ref() else {
            log::warn!("Toggle for {} ignored, no board loaded", member_id);
            return None;
        };
        let next = board.toggle(member_id, status);
        let result = next.status_of(member_id);
        state.board = Some(next);
        state.dirty = true;
        state.revision += 1;
        Some(result)
    }

    /// Publish the active board for every member of `roster`
    pub async fn publish<S: AsRef<str>>(
        &self,
        roster: &[S],
        recorded_by: &str,
    ) -> Result<(), SyncError> {
        let (board, revision) = {
            let state = self.state.lock();
            (state.board.clone(), state.revision)
        };
        let Some(board) = board else {
            self.feedback
                .notify("No attendance board loaded", Category::Error);
            return Err(SyncError::NotLoaded);
        };

        let key = board.key().clone();
        self.engine
            .publish(&key.class_id, key.date, roster, &board, recorded_by)
            .await?;

        let mut state = self.state.lock();
        if state.revision == revision {
            state.dirty = false;
        }
        Ok(())
    }

    /// Forget unsynced edits so the next load may replace the board
    pub fn discard_changes(&self) {
        self.state.lock().dirty = false;
    }

    pub fn board(&self) -> Option<AttendanceBoard> {
        self.state.lock().board.clone()
    }

    pub fn status_of(&self, member_id: &str) -> AttendanceStatus {
        self.state
            .lock()
            .board
            .as_ref()
            .map(|b| b.status_of(member_id))
            .unwrap_or_default()
    }

    pub fn has_unsynced_changes(&self) -> bool {
        self.state.lock().dirty
    }

    /// True while a publish is in flight
    pub fn is_publishing(&self) -> bool {
        self.engine.is_busy()
    }

    /// Key of the dirty board a load of `requested` would clobber
    fn refusal(&self, state: &State, requested: &BoardKey) -> Option<BoardKey> {
        if self.policy != UnsyncedPolicy::Refuse || !state.dirty {
            return None;
        }
        state
            .board
            .as_ref()
            .map(AttendanceBoard::key)
            .filter(|current| *current != requested)
            .cloned()
    }

    fn refuse(&self, requested: &BoardKey, current: BoardKey) -> LoadError {
        log::warn!("Refusing to load {} over unsynced edits for {}", requested, current);
        self.feedback.notify(
            format!("Publish or discard the attendance for {} first", current),
            Category::Error,
        );
        LoadError::UnsyncedChanges { current }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{MemoryStore, Record};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::oneshot;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn row(member: &str, date: NaiveDate, status: &str) -> Record {
        json!({
            "member_id": member, "class_id": "C1", "date": date,
            "status": status, "recorded_by": "admin"
        })
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_batch(
                Collection::Attendance,
                vec![row("A", day(13), "late"), row("B", day(14), "present")],
            )
            .await
            .unwrap();
        store
    }

    /// Store whose reads for gated dates wait for a signal
    struct GatedDayStore {
        inner: MemoryStore,
        gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    }

    impl GatedDayStore {
        async fn new() -> Self {
            let inner = MemoryStore::new();
            inner
                .upsert_batch(
                    Collection::Attendance,
                    vec![row("A", day(13), "late"), row("B", day(14), "present")],
                )
                .await
                .unwrap();
            Self {
                inner,
                gates: Mutex::new(HashMap::new()),
            }
        }

        fn gate(&self, date: NaiveDate) -> oneshot::Sender<()> {
            let (release, gate) = oneshot::channel();
            self.gates.lock().insert(date.to_string(), gate);
            release
        }

        fn is_gated(&self, date: NaiveDate) -> bool {
            self.gates.lock().contains_key(&date.to_string())
        }
    }

    #[async_trait]
    impl RecordStore for GatedDayStore {
        async fn get_records(&self, c: Collection, f: &Filter) -> Result<Vec<Record>, Error> {
            let gate = {
                let mut gates = self.gates.lock();
                f.conditions().iter().find_map(|(_, v)| gates.remove(v))
            };
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.inner.get_records(c, f).await
        }
        async fn upsert_batch(&self, c: Collection, r: Vec<Record>) -> Result<(), Error> {
            self.inner.upsert_batch(c, r).await
        }
        async fn update_record(&self, c: Collection, id: &str, r: Record) -> Result<(), Error> {
            self.inner.update_record(c, id, r).await
        }
        async fn delete_record(&self, c: Collection, id: &str) -> Result<(), Error> {
            self.inner.delete_record(c, id).await
        }
    }

    fn gated_session(store: &Arc<GatedDayStore>) -> Arc<AttendanceSession> {
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        Arc::new(AttendanceSession::new(
            store.clone(),
            feedback,
            &ClientOptions::default(),
        ))
    }

    async fn wait_for_fetch(store: &GatedDayStore, date: NaiveDate) {
        while store.is_gated(date) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn load_replaces_the_board_wholesale() {
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let session = AttendanceSession::new(seeded().await, feedback, &ClientOptions::default());

        session.load("C1", day(13)).await.unwrap();
        assert_eq!(session.status_of("A"), AttendanceStatus::Late);

        session.load("C1", day(14)).await.unwrap();
        assert_eq!(session.status_of("A"), AttendanceStatus::Absent);
        assert_eq!(session.status_of("B"), AttendanceStatus::Present);
        assert_eq!(session.board().unwrap().key(), &BoardKey::new("C1", day(14)));
    }

    #[tokio::test]
    async fn late_arrival_of_an_older_load_is_discarded() {
        let store = Arc::new(GatedDayStore::new().await);
        let release = store.gate(day(13));
        let session = gated_session(&store);

        let older = {
            let session = session.clone();
            tokio::spawn(async move { session.load("C1", day(13)).await })
        };
        wait_for_fetch(&store, day(13)).await;

        let newer = session.load("C1", day(14)).await.unwrap();
        assert!(matches!(newer, LoadOutcome::Applied(_)));

        release.send(()).unwrap();
        let older = older.await.unwrap().unwrap();
        assert_eq!(older, LoadOutcome::Superseded);

        assert_eq!(session.board().unwrap().key().date, day(14));
        assert_eq!(session.status_of("B"), AttendanceStatus::Present);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn older_load_resolving_first_never_applies() {
        for _ in 0..20 {
            let store = Arc::new(GatedDayStore::new().await);
            let release_older = store.gate(day(13));
            let release_newer = store.gate(day(14));
            let session = gated_session(&store);

            let older = {
                let session = session.clone();
                tokio::spawn(async move { session.load("C1", day(13)).await })
            };
            wait_for_fetch(&store, day(13)).await;
            let newer = {
                let session = session.clone();
                tokio::spawn(async move { session.load("C1", day(14)).await })
            };
            wait_for_fetch(&store, day(14)).await;

            release_older.send(()).unwrap();
            assert_eq!(older.await.unwrap().unwrap(), LoadOutcome::Superseded);
            assert!(session.board().is_none());

            release_newer.send(()).unwrap();
            assert!(matches!(newer.await.unwrap().unwrap(), LoadOutcome::Applied(_)));
            assert_eq!(session.board().unwrap().key(), &BoardKey::new("C1", day(14)));
        }
    }

    #[tokio::test]
    async fn toggle_marks_unsynced_and_publish_clears_it() {
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let store = seeded().await;
        let session = AttendanceSession::new(store.clone(), feedback, &ClientOptions::default());

        assert_eq!(session.toggle("A", AttendanceStatus::Present), None);

        session.load("C1", day(14)).await.unwrap();
        let marked = session.toggle("A", AttendanceStatus::Present);
        assert_eq!(marked, Some(AttendanceStatus::Present));
        assert!(session.has_unsynced_changes());

        session.publish(&["A", "B"], "admin").await.unwrap();
        assert!(!session.has_unsynced_changes());
    }

    #[tokio::test]
    async fn discard_policy_drops_edits_on_switch() {
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let options = ClientOptions::default();
        let session = AttendanceSession::new(seeded().await, feedback.clone(), &options);

        session.load("C1", day(14)).await.unwrap();
        session.toggle("C", AttendanceStatus::Excused);
        session.load("C1", day(13)).await.unwrap();
        session.load("C1", day(14)).await.unwrap();

        assert_eq!(session.status_of("C"), AttendanceStatus::Absent);
        assert!(feedback.notifications().is_empty());
    }

    #[tokio::test]
    async fn refuse_policy_blocks_switch_until_discarded() {
        let options = ClientOptions::default().with_unsynced_policy(UnsyncedPolicy::Refuse);
        let feedback = Feedback::mount(&options).unwrap();
        let session = AttendanceSession::new(seeded().await, feedback.clone(), &options);

        session.load("C1", day(14)).await.unwrap();
        session.toggle("C", AttendanceStatus::Excused);

        let refused = session.load("C1", day(13)).await;
        assert!(matches!(refused, Err(LoadError::UnsyncedChanges { .. })));
        assert_eq!(session.status_of("C"), AttendanceStatus::Excused);
        assert_eq!(feedback.notifications()[0].category, Category::Error);

        session.discard_changes();
        session.load("C1", day(13)).await.unwrap();
        assert_eq!(session.status_of("A"), AttendanceStatus::Late);
    }

    #[tokio::test]
    async fn refuse_policy_allows_reloading_the_same_day() {
        let options = ClientOptions::default().with_unsynced_policy(UnsyncedPolicy::Refuse);
        let feedback = Feedback::mount(&options).unwrap();
        let session = AttendanceSession::new(seeded().await, feedback.clone(), &options);

        session.load("C1", day(14)).await.unwrap();
        session.toggle("A", AttendanceStatus::Present);

        let reloaded = session.load("C1", day(14)).await.unwrap();
        assert!(matches!(reloaded, LoadOutcome::Applied(_)));
        assert_eq!(session.status_of("A"), AttendanceStatus::Absent);
        assert!(!session.has_unsynced_changes());
        assert!(feedback.notifications().is_empty());
    }

    #[tokio::test]
    async fn publish_without_board_is_reported() {
        let feedback = Feedback::mount(&ClientOptions::default()).unwrap();
        let options = ClientOptions::default();
        let session = AttendanceSession::new(seeded().await, feedback.clone(), &options);

        let result = session.publish(&["A"], "admin").await;
        assert!(matches!(result, Err(SyncError::NotLoaded)));
        assert_eq!(feedback.notifications().len(), 1);
    }
}
