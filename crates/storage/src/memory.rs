//! In-memory `CustodyStorage` backend.
//!
//! Committed batches live in a mutex-guarded ordered map. A snapshot stages
//! its writes privately; commit re-validates every staged write against the
//! committed map and applies all of them under a single lock acquisition, or
//! none.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::StoredBatch;
use crate::traits::CustodyStorage;

pub(crate) type BatchMap = BTreeMap<String, StoredBatch>;

/// A write staged inside a snapshot.
#[derive(Debug, Clone)]
struct StagedWrite {
    payload: Vec<u8>,
    /// Committed version this write was based on. `None` for an insert,
    /// which requires the batch to still be absent at commit.
    base_version: Option<i64>,
    /// Version the batch will carry once committed.
    staged_version: i64,
}

/// Transaction handle for [`MemoryStorage`] and the file backend.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    writes: BTreeMap<String, StagedWrite>,
}

impl MemorySnapshot {
    /// Number of batches this snapshot will write on commit.
    pub fn staged_len(&self) -> usize {
        self.writes.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    committed: Arc<Mutex<BatchMap>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with already committed batches.
    pub fn with_batches(batches: impl IntoIterator<Item = StoredBatch>) -> Self {
        let map = batches
            .into_iter()
            .map(|b| (b.batch_id.clone(), b))
            .collect();
        Self {
            committed: Arc::new(Mutex::new(map)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BatchMap>, StorageError> {
        self.committed
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }

    /// Validate and apply a snapshot.
    ///
    /// `persist` sees the complete post-commit map before it replaces the
    /// committed state; if it fails, nothing is applied.
    pub(crate) fn commit_with<P>(
        &self,
        snapshot: MemorySnapshot,
        persist: P,
    ) -> Result<(), StorageError>
    where
        P: FnOnce(&BatchMap) -> Result<(), StorageError>,
    {
        if snapshot.writes.is_empty() {
            return Ok(());
        }

        let mut committed = self.lock()?;

        for (batch_id, write) in &snapshot.writes {
            let current = committed.get(batch_id).map(|b| b.version);
            match (write.base_version, current) {
                (None, None) => {}
                (None, Some(_)) => {
                    return Err(StorageError::AlreadyExists {
                        batch_id: batch_id.clone(),
                    })
                }
                (Some(_), None) => {
                    return Err(StorageError::BatchNotFound {
                        batch_id: batch_id.clone(),
                    })
                }
                (Some(expected), Some(actual)) if expected != actual => {
                    return Err(StorageError::ConcurrentConflict {
                        batch_id: batch_id.clone(),
                        expected_version: expected,
                    })
                }
                (Some(_), Some(_)) => {}
            }
        }

        let mut next = committed.clone();
        for (batch_id, write) in snapshot.writes {
            next.insert(
                batch_id.clone(),
                StoredBatch {
                    batch_id,
                    version: write.staged_version,
                    payload: write.payload,
                },
            );
        }

        persist(&next)?;
        *committed = next;
        Ok(())
    }
}

#[async_trait]
impl CustodyStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let staged = snapshot.staged_len();
        self.commit_with(snapshot, |_| Ok(()))?;
        tracing::debug!(staged, "memory snapshot committed");
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        tracing::debug!(staged = snapshot.staged_len(), "memory snapshot aborted");
        Ok(())
    }

    async fn get_batch_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        batch_id: &str,
    ) -> Result<Option<StoredBatch>, StorageError> {
        if let Some(write) = snapshot.writes.get(batch_id) {
            return Ok(Some(StoredBatch {
                batch_id: batch_id.to_string(),
                version: write.staged_version,
                payload: write.payload.clone(),
            }));
        }
        Ok(self.lock()?.get(batch_id).cloned())
    }

    async fn insert_batch(
        &self,
        snapshot: &mut MemorySnapshot,
        batch_id: &str,
        payload: Vec<u8>,
    ) -> Result<(), StorageError> {
        if snapshot.writes.contains_key(batch_id) || self.lock()?.contains_key(batch_id) {
            return Err(StorageError::AlreadyExists {
                batch_id: batch_id.to_string(),
            });
        }
        snapshot.writes.insert(
            batch_id.to_string(),
            StagedWrite {
                payload,
                base_version: None,
                staged_version: 0,
            },
        );
        Ok(())
    }

    async fn update_batch(
        &self,
        snapshot: &mut MemorySnapshot,
        batch_id: &str,
        expected_version: i64,
        payload: Vec<u8>,
    ) -> Result<i64, StorageError> {
        if let Some(write) = snapshot.writes.get_mut(batch_id) {
            if write.staged_version != expected_version {
                return Err(StorageError::ConcurrentConflict {
                    batch_id: batch_id.to_string(),
                    expected_version,
                });
            }
            write.payload = payload;
            write.staged_version += 1;
            return Ok(write.staged_version);
        }

        let current = self
            .lock()?
            .get(batch_id)
            .map(|b| b.version)
            .ok_or_else(|| StorageError::BatchNotFound {
                batch_id: batch_id.to_string(),
            })?;
        if current != expected_version {
            return Err(StorageError::ConcurrentConflict {
                batch_id: batch_id.to_string(),
                expected_version,
            });
        }

        let new_version = expected_version + 1;
        snapshot.writes.insert(
            batch_id.to_string(),
            StagedWrite {
                payload,
                base_version: Some(expected_version),
                staged_version: new_version,
            },
        );
        Ok(new_version)
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<StoredBatch>, StorageError> {
        Ok(self.lock()?.get(batch_id).cloned())
    }

    async fn list_batches(&self) -> Result<Vec<StoredBatch>, StorageError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}
