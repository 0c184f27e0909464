//! Error types for the durable store.

/// Errors that can occur in a [`Storage`](crate::Storage) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The store was used after [`close`](crate::Storage::close).
    #[error("storage is closed")]
    Closed,
}
