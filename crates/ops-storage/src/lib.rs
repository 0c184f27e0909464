//! Durable store for the ops operator framework.
//!
//! The framework persists two kinds of data between process invocations:
//!
//! - **Snapshots** -- JSON values keyed by a handle path (event payloads,
//!   stored state).
//! - **Notices** -- `(event, observer, method)` triples recording which
//!   observer still owes a reaction to which deferred event.
//!
//! [`Storage`] is the contract. [`MemoryStorage`] is the in-memory
//! implementation used by the test harness; it models commit semantics so
//! that process restarts can be simulated faithfully.
//!
//! # Modules
//!
//! - [`memory`] -- [`MemoryStorage`].
//! - [`error`] -- [`StorageError`].

pub mod error;
pub mod memory;

pub use error::StorageError;
pub use memory::MemoryStorage;

use ops_types::Notice;

/// Key/value persistence for snapshots plus an ordered notice queue.
///
/// Writes are visible to subsequent reads on the same store immediately,
/// but are only guaranteed to survive a process exit once [`commit`] has
/// returned. A crash before commit leaves previously committed state
/// untouched.
///
/// [`commit`]: Storage::commit
pub trait Storage {
    /// Store `snapshot` under `handle_path`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store is closed or the write fails.
    fn save_snapshot(
        &mut self,
        handle_path: &str,
        snapshot: serde_json::Value,
    ) -> Result<(), StorageError>;

    /// Load the snapshot stored under `handle_path`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store is closed or the read fails.
    fn load_snapshot(&self, handle_path: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Remove the snapshot under `handle_path`. Absent keys are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store is closed or the write fails.
    fn drop_snapshot(&mut self, handle_path: &str) -> Result<(), StorageError>;

    /// Append a notice. Saving a notice that already exists is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store is closed or the write fails.
    fn save_notice(&mut self, notice: &Notice) -> Result<(), StorageError>;

    /// Remove a notice. Removing an absent notice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store is closed or the write fails.
    fn drop_notice(&mut self, notice: &Notice) -> Result<(), StorageError>;

    /// Return notices in creation order, optionally filtered to one event
    /// path.
    ///
    /// The result is a copy: callers may add or drop notices while walking
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store is closed or the read fails.
    fn notices(&self, event_path: Option<&str>) -> Result<Vec<Notice>, StorageError>;

    /// Make every write so far durable.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store is closed or the flush fails.
    fn commit(&mut self) -> Result<(), StorageError>;

    /// Release the store. Further calls fail with [`StorageError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store was already closed.
    fn close(&mut self) -> Result<(), StorageError>;
}
