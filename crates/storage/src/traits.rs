use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::StoredBatch;

/// The storage trait for custody ledger backends.
///
/// A `CustodyStorage` implementation is a key-value store keyed by batch
/// identifier. It never interprets payload bytes.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` - start a transaction, returns a `Snapshot`
/// 2. Call read/write methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` - commit and consume the transaction
///    OR `abort_snapshot(snapshot)` - roll back and consume the transaction
///
/// Writes made through a snapshot are visible to reads through the same
/// snapshot and invisible to everything else until commit. If a `Snapshot`
/// is dropped without committing, its writes MUST be discarded.
///
/// ## OCC Conflict Detection
///
/// `update_batch` is conditional on the stored version being
/// `expected_version`. Implementations re-check every staged write at commit
/// time; if any batch changed underneath the snapshot, the commit fails with
/// `ConcurrentConflict` (or `AlreadyExists` for a racing insert) and applies
/// nothing.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait CustodyStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all staged writes durable at once.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all staged writes.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Batch operations (within snapshot) ───────────────────────────────────

    /// Read a batch as seen by this snapshot, including its own staged writes.
    ///
    /// Returns `Ok(None)` if no batch exists under `batch_id`.
    async fn get_batch_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        batch_id: &str,
    ) -> Result<Option<StoredBatch>, StorageError>;

    /// Stage a new batch at version 0.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the batch exists either
    /// in committed state or in this snapshot.
    async fn insert_batch(
        &self,
        snapshot: &mut Self::Snapshot,
        batch_id: &str,
        payload: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Stage a version-validated replacement of a batch's payload (OCC).
    ///
    /// Returns the new version number on success,
    /// `Err(StorageError::BatchNotFound)` if the batch does not exist, and
    /// `Err(StorageError::ConcurrentConflict)` if its version is not
    /// `expected_version`.
    async fn update_batch(
        &self,
        snapshot: &mut Self::Snapshot,
        batch_id: &str,
        expected_version: i64,
        payload: Vec<u8>,
    ) -> Result<i64, StorageError>;

    // ── Query operations (committed state only) ──────────────────────────────

    /// Read a committed batch. Returns `Ok(None)` if absent.
    async fn get_batch(&self, batch_id: &str) -> Result<Option<StoredBatch>, StorageError>;

    /// List all committed batches ordered by identifier.
    async fn list_batches(&self) -> Result<Vec<StoredBatch>, StorageError>;
}
