/// All errors that can be returned by a CustodyStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another transaction modified
    /// the batch after it was read. The expected version was not found.
    #[error("concurrent conflict on batch {batch_id}: expected version {expected_version}")]
    ConcurrentConflict {
        batch_id: String,
        expected_version: i64,
    },

    /// No stored batch with the given identifier.
    #[error("batch not found: {batch_id}")]
    BatchNotFound { batch_id: String },

    /// A batch with this identifier is already stored.
    #[error("batch already exists: {batch_id}")]
    AlreadyExists { batch_id: String },

    /// A backend-specific storage error (I/O, serialization, lock poisoning).
    #[error("storage backend error: {0}")]
    Backend(String),
}
