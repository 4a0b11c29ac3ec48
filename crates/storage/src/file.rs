//! JSON-file `CustodyStorage` backend.
//!
//! Keeps the committed batches in memory and rewrites the whole file on
//! every commit: the new image is written to a sibling temp file and renamed
//! over the original, so a crash mid-write leaves the previous image intact.
//! Payloads are stored base64-encoded.
//!
//! The file is read once at open. Two processes writing the same file do
//! not see each other's commits.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::memory::{BatchMap, MemorySnapshot, MemoryStorage};
use crate::record::StoredBatch;
use crate::traits::CustodyStorage;

/// On-disk image format version.
const FILE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct FileImage {
    format: u32,
    batches: Vec<FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    batch_id: String,
    version: i64,
    payload: String,
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    memory: MemoryStorage,
}

impl FileStorage {
    /// Open the store at `path`, creating an empty one if the file does not
    /// exist yet. The file itself is only created on first commit.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let batches = if path.exists() {
            load_image(&path)?
        } else {
            Vec::new()
        };
        tracing::debug!(path = %path.display(), batches = batches.len(), "opened file store");
        Ok(Self {
            path,
            memory: MemoryStorage::with_batches(batches),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_image(path: &Path) -> Result<Vec<StoredBatch>, StorageError> {
    let bytes = std::fs::read(path)
        .map_err(|e| StorageError::Backend(format!("failed to read {}: {}", path.display(), e)))?;
    let image: FileImage = serde_json::from_slice(&bytes).map_err(|e| {
        StorageError::Backend(format!("invalid store file {}: {}", path.display(), e))
    })?;
    if image.format != FILE_FORMAT_VERSION {
        return Err(StorageError::Backend(format!(
            "unsupported store format {} in {} (expected {})",
            image.format,
            path.display(),
            FILE_FORMAT_VERSION
        )));
    }

    image
        .batches
        .into_iter()
        .map(|entry| {
            let payload = BASE64.decode(entry.payload.as_bytes()).map_err(|e| {
                StorageError::Backend(format!(
                    "invalid payload for batch {} in {}: {}",
                    entry.batch_id,
                    path.display(),
                    e
                ))
            })?;
            Ok(StoredBatch {
                batch_id: entry.batch_id,
                version: entry.version,
                payload,
            })
        })
        .collect()
}

fn write_image(path: &Path, batches: &BatchMap) -> Result<(), StorageError> {
    let image = FileImage {
        format: FILE_FORMAT_VERSION,
        batches: batches
            .values()
            .map(|b| FileEntry {
                batch_id: b.batch_id.clone(),
                version: b.version,
                payload: BASE64.encode(&b.payload),
            })
            .collect(),
    };
    let bytes = serde_json::to_vec_pretty(&image)
        .map_err(|e| StorageError::Backend(format!("failed to serialize store: {}", e)))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            StorageError::Backend(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(&tmp, bytes)
        .map_err(|e| StorageError::Backend(format!("failed to write {}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        StorageError::Backend(format!("failed to replace {}: {}", path.display(), e))
    })
}

#[async_trait]
impl CustodyStorage for FileStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        self.memory.begin_snapshot().await
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let staged = snapshot.staged_len();
        self.memory
            .commit_with(snapshot, |next| write_image(&self.path, next))?;
        tracing::debug!(staged, path = %self.path.display(), "file snapshot committed");
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        self.memory.abort_snapshot(snapshot).await
    }

    async fn get_batch_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        batch_id: &str,
    ) -> Result<Option<StoredBatch>, StorageError> {
        self.memory.get_batch_for_update(snapshot, batch_id).await
    }

    async fn insert_batch(
        &self,
        snapshot: &mut MemorySnapshot,
        batch_id: &str,
        payload: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.memory.insert_batch(snapshot, batch_id, payload).await
    }

    async fn update_batch(
        &self,
        snapshot: &mut MemorySnapshot,
        batch_id: &str,
        expected_version: i64,
        payload: Vec<u8>,
    ) -> Result<i64, StorageError> {
        self.memory
            .update_batch(snapshot, batch_id, expected_version, payload)
            .await
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<StoredBatch>, StorageError> {
        self.memory.get_batch(batch_id).await
    }

    async fn list_batches(&self) -> Result<Vec<StoredBatch>, StorageError> {
        self.memory.list_batches().await
    }
}
