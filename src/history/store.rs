//! Process-scoped owner of the history state

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::persistence::{HistoryPersistence, PersistenceError};
use super::{HistoryState, PruneStats};

/// Holds the published `HistoryState` and its persistence port.
///
/// Readers get an `Arc` snapshot and never observe a half-applied cycle: the
/// scheduler edits a private working copy and publishes it with one swap.
pub struct HistoryStore {
    state: RwLock<Arc<HistoryState>>,
    persistence: Arc<dyn HistoryPersistence>,
}

impl HistoryStore {
    /// Create a store with an empty history
    pub fn new(persistence: Arc<dyn HistoryPersistence>) -> Self {
        Self::with_state(persistence, HistoryState::new())
    }

    pub fn with_state(persistence: Arc<dyn HistoryPersistence>, state: HistoryState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
            persistence,
        }
    }

    /// Load prior state. A missing or unreadable document yields an empty
    /// history; this never fails.
    pub fn load(persistence: Arc<dyn HistoryPersistence>) -> Self {
        let state = match persistence.load() {
            Ok(Some(state)) => {
                tracing::info!(
                    checks = state.checks.len(),
                    rollups = state.daily_stats.len(),
                    "Loaded check history"
                );
                state
            }
            Ok(None) => {
                tracing::warn!("No check history found, starting empty");
                HistoryState::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load check history, starting empty");
                HistoryState::new()
            }
        };

        Self::with_state(persistence, state)
    }

    /// Current published state
    pub fn snapshot(&self) -> Arc<HistoryState> {
        Arc::clone(&*self.state.read())
    }

    /// Owned copy of the current state for a cycle to edit
    pub fn working_copy(&self) -> HistoryState {
        self.state.read().as_ref().clone()
    }

    /// Publish `state` without touching persistence
    #[cfg(test)]
    pub(crate) fn publish(&self, state: HistoryState) {
        *self.state.write() = Arc::new(state);
    }

    /// Apply retention to `state`, publish it, then write it out.
    ///
    /// Publication happens even when the write fails; the next cycle
    /// rewrites the whole document anyway.
    pub fn prune_and_persist(
        &self,
        mut state: HistoryState,
        now: DateTime<Utc>,
    ) -> Result<PruneStats, PersistenceError> {
        let stats = state.prune(now);
        if stats.checks_removed > 0 || stats.rollups_removed > 0 {
            tracing::debug!(
                checks = stats.checks_removed,
                rollups = stats.rollups_removed,
                "Pruned expired history"
            );
        }

        let published = Arc::new(state);
        *self.state.write() = Arc::clone(&published);

        self.persistence.save(&published)?;
        Ok(stats)
    }

    /// Write the currently published state
    pub fn persist(&self) -> Result<(), PersistenceError> {
        let snapshot = self.snapshot();
        self.persistence.save(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::{record, rollup};
    use crate::history::JsonFileStore;
    use chrono::{Duration, TimeZone};

    struct FailingStore;

    impl HistoryPersistence for FailingStore {
        fn load(&self) -> Result<Option<HistoryState>, PersistenceError> {
            Err(PersistenceError::Deserialization("corrupt".to_string()))
        }

        fn save(&self, _state: &HistoryState) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    #[test]
    fn test_load_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let store = HistoryStore::load(Arc::new(JsonFileStore::new(&path)));
        assert_eq!(*store.snapshot(), HistoryState::new());
    }

    #[test]
    fn test_load_error_starts_empty() {
        let store = HistoryStore::load(Arc::new(FailingStore));
        assert!(store.snapshot().checks.is_empty());
    }

    #[test]
    fn test_snapshot_unchanged_until_published() {
        let store = HistoryStore::new(Arc::new(FailingStore));
        let before = store.snapshot();

        let mut working = store.working_copy();
        working.append(record(Utc::now(), "/a", true, 5));
        assert!(store.snapshot().checks.is_empty());

        store.publish(working);
        assert_eq!(store.snapshot().checks.len(), 1);
        assert!(before.checks.is_empty());
    }

    #[test]
    fn test_prune_and_persist_writes_pruned_state() {
        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(JsonFileStore::new(dir.path().join("history.json")));
        let store = HistoryStore::new(file.clone());

        let now = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        let mut working = store.working_copy();
        working.append(record(now - Duration::days(8), "/a", true, 5));
        working.append(record(now - Duration::hours(1), "/a", true, 5));
        working.upsert_daily_rollup(rollup((now - Duration::days(9)).date_naive(), 1));
        working.upsert_daily_rollup(rollup(now.date_naive(), 1));

        let stats = store.prune_and_persist(working, now).unwrap();
        assert_eq!(stats.checks_removed, 1);
        assert_eq!(stats.rollups_removed, 1);

        let on_disk = file.load().unwrap().unwrap();
        assert_eq!(on_disk, *store.snapshot());
        assert_eq!(on_disk.checks.len(), 1);
    }

    #[test]
    fn test_write_failure_still_publishes() {
        let store = HistoryStore::new(Arc::new(FailingStore));
        let mut working = store.working_copy();
        working.append(record(Utc::now(), "/a", true, 5));

        assert!(store.prune_and_persist(working, Utc::now()).is_err());
        assert_eq!(store.snapshot().checks.len(), 1);
    }
}
