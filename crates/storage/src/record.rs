use serde::{Deserialize, Serialize};

/// One batch as held by the backend: opaque payload bytes plus the version
/// used for optimistic concurrency checks.
///
/// A freshly inserted batch is at version 0; every committed update
/// increments the version by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBatch {
    pub batch_id: String,
    pub version: i64,
    pub payload: Vec<u8>,
}
