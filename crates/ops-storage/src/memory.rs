//! In-memory [`Storage`] implementation.
//!
//! All state lives in process memory, so nothing survives a real process
//! exit. To let tests reason about restarts, the store keeps two copies of
//! its data:
//!
//! - the **working** set, which every read and write touches, and
//! - the **committed** set, which [`Storage::commit`] overwrites with the
//!   working set.
//!
//! [`MemoryStorage::restarted`] builds a fresh store from the committed set
//! only, which is exactly what a new process would observe after the
//! previous one exited (cleanly or not).
//!
//! Clones share the same backing data but track `close` independently, so a
//! test can hand one clone to a framework and keep another for inspection.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ops_types::Notice;

use crate::Storage;
use crate::error::StorageError;

#[derive(Debug, Clone, Default, PartialEq)]
struct StoreData {
    snapshots: BTreeMap<String, serde_json::Value>,
    /// Creation order.
    notices: Vec<Notice>,
}

#[derive(Debug, Default)]
struct Shared {
    working: StoreData,
    committed: StoreData,
}

/// A [`Storage`] that only writes to memory.
///
/// Not suitable for production use: all state is lost when the process
/// exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    shared: Rc<RefCell<Shared>>,
    closed: bool,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new, independent store holding only the committed state.
    ///
    /// Models the next process invocation: anything written but not
    /// committed is gone.
    pub fn restarted(&self) -> Self {
        let committed = self.shared.borrow().committed.clone();
        Self {
            shared: Rc::new(RefCell::new(Shared {
                working: committed.clone(),
                committed,
            })),
            closed: false,
        }
    }

    /// Paths of all snapshots in the working set, sorted.
    pub fn snapshot_paths(&self) -> Vec<String> {
        self.shared.borrow().working.snapshots.keys().cloned().collect()
    }

    /// Whether the working set differs from the committed set.
    pub fn has_uncommitted_changes(&self) -> bool {
        let shared = self.shared.borrow();
        shared.working != shared.committed
    }

    const fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Storage for MemoryStorage {
    fn save_snapshot(
        &mut self,
        handle_path: &str,
        snapshot: serde_json::Value,
    ) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.shared
            .borrow_mut()
            .working
            .snapshots
            .insert(handle_path.to_owned(), snapshot);
        tracing::debug!(path = handle_path, "Saved snapshot");
        Ok(())
    }

    fn load_snapshot(&self, handle_path: &str) -> Result<Option<serde_json::Value>, StorageError> {
        self.ensure_open()?;
        Ok(self
            .shared
            .borrow()
            .working
            .snapshots
            .get(handle_path)
            .cloned())
    }

    fn drop_snapshot(&mut self, handle_path: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        if self
            .shared
            .borrow_mut()
            .working
            .snapshots
            .remove(handle_path)
            .is_some()
        {
            tracing::debug!(path = handle_path, "Dropped snapshot");
        }
        Ok(())
    }

    fn save_notice(&mut self, notice: &Notice) -> Result<(), StorageError> {
        self.ensure_open()?;
        let mut shared = self.shared.borrow_mut();
        if !shared.working.notices.contains(notice) {
            shared.working.notices.push(notice.clone());
            tracing::debug!(%notice, "Saved notice");
        }
        Ok(())
    }

    fn drop_notice(&mut self, notice: &Notice) -> Result<(), StorageError> {
        self.ensure_open()?;
        let mut shared = self.shared.borrow_mut();
        if let Some(pos) = shared.working.notices.iter().position(|n| n == notice) {
            shared.working.notices.remove(pos);
            tracing::debug!(%notice, "Dropped notice");
        }
        Ok(())
    }

    fn notices(&self, event_path: Option<&str>) -> Result<Vec<Notice>, StorageError> {
        self.ensure_open()?;
        let shared = self.shared.borrow();
        Ok(shared
            .working
            .notices
            .iter()
            .filter(|n| event_path.is_none_or(|path| n.event_path == path))
            .cloned()
            .collect())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        let mut shared = self.shared.borrow_mut();
        shared.committed = shared.working.clone();
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ops_types::Handle;
    use serde_json::json;

    use super::*;

    fn notice(event: &str, observer: &str, method: &str) -> Notice {
        Notice {
            event_path: event.to_owned(),
            observer_path: observer.to_owned(),
            method: method.to_owned(),
        }
    }

    #[test]
    fn snapshot_save_load_drop() {
        let mut store = MemoryStorage::new();
        assert_eq!(store.load_snapshot("Charm/on/start[1]").unwrap(), None);

        store
            .save_snapshot("Charm/on/start[1]", json!({"type": "empty"}))
            .unwrap();
        assert_eq!(
            store.load_snapshot("Charm/on/start[1]").unwrap(),
            Some(json!({"type": "empty"}))
        );

        store.drop_snapshot("Charm/on/start[1]").unwrap();
        assert_eq!(store.load_snapshot("Charm/on/start[1]").unwrap(), None);
        // Dropping again is harmless.
        store.drop_snapshot("Charm/on/start[1]").unwrap();
    }

    #[test]
    fn notices_keep_creation_order_and_filter_by_event() {
        let mut store = MemoryStorage::new();
        store.save_notice(&notice("e[2]", "Charm", "a")).unwrap();
        store.save_notice(&notice("e[1]", "Charm", "a")).unwrap();
        store.save_notice(&notice("e[2]", "Charm/Helper", "b")).unwrap();

        let all = store.notices(None).unwrap();
        assert_eq!(
            all,
            vec![
                notice("e[2]", "Charm", "a"),
                notice("e[1]", "Charm", "a"),
                notice("e[2]", "Charm/Helper", "b"),
            ]
        );

        let filtered = store.notices(Some("e[2]")).unwrap();
        assert_eq!(
            filtered,
            vec![
                notice("e[2]", "Charm", "a"),
                notice("e[2]", "Charm/Helper", "b"),
            ]
        );
    }

    #[test]
    fn saving_a_notice_twice_keeps_one_copy() {
        let mut store = MemoryStorage::new();
        let n = Notice::new(
            &Handle::new("Charm", None).nest("start", Some("1")),
            &Handle::new("Charm", None),
            "on_start",
        );
        store.save_notice(&n).unwrap();
        store.save_notice(&n).unwrap();
        assert_eq!(store.notices(None).unwrap().len(), 1);
    }

    #[test]
    fn dropping_an_absent_notice_is_a_no_op() {
        let mut store = MemoryStorage::new();
        store.save_notice(&notice("e[1]", "Charm", "a")).unwrap();
        store.drop_notice(&notice("e[9]", "Charm", "a")).unwrap();
        assert_eq!(store.notices(None).unwrap().len(), 1);
    }

    #[test]
    fn notice_listing_tolerates_mutation_while_walking() {
        let mut store = MemoryStorage::new();
        store.save_notice(&notice("e[1]", "Charm", "a")).unwrap();
        store.save_notice(&notice("e[1]", "Charm", "b")).unwrap();

        let mut seen = Vec::new();
        for n in store.notices(Some("e[1]")).unwrap() {
            store.drop_notice(&n).unwrap();
            seen.push(n.method);
        }
        assert_eq!(seen, vec!["a", "b"]);
        assert!(store.notices(None).unwrap().is_empty());
    }

    #[test]
    fn restart_discards_uncommitted_writes() {
        let mut store = MemoryStorage::new();
        store.save_snapshot("kept", json!(1)).unwrap();
        store.save_notice(&notice("kept", "Charm", "a")).unwrap();
        store.commit().unwrap();
        assert!(!store.has_uncommitted_changes());

        store.save_snapshot("lost", json!(2)).unwrap();
        store.drop_notice(&notice("kept", "Charm", "a")).unwrap();
        assert!(store.has_uncommitted_changes());

        let next = store.restarted();
        assert_eq!(next.snapshot_paths(), vec!["kept".to_owned()]);
        assert_eq!(next.notices(None).unwrap(), vec![notice("kept", "Charm", "a")]);
    }

    #[test]
    fn clones_share_data_but_close_independently() {
        let mut store = MemoryStorage::new();
        let mut other = store.clone();
        other.save_snapshot("x", json!(true)).unwrap();
        other.close().unwrap();

        assert_eq!(store.load_snapshot("x").unwrap(), Some(json!(true)));
        assert!(matches!(other.load_snapshot("x"), Err(StorageError::Closed)));
        assert!(matches!(other.close(), Err(StorageError::Closed)));
        store.commit().unwrap();
    }
}
