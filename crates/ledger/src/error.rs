use custody_core::{CodecError, ErrorKind, TransitionError};
use custody_storage::StorageError;

use crate::identity::IdentityError;

/// Errors surfaced by [`CustodyLedger`](crate::CustodyLedger) operations.
///
/// Every error is terminal for the invocation that produced it. The ledger
/// aborts its snapshot before returning one, so nothing is persisted.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The transition engine rejected the operation.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The caller's credential could not be resolved to a role.
    #[error("identity unavailable: {0}")]
    Identity(#[from] IdentityError),

    /// The state store failed or detected a conflicting write.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A stored payload could not be decoded, or a record could not be encoded.
    #[error("batch {batch_id}: {source}")]
    Codec {
        batch_id: String,
        #[source]
        source: CodecError,
    },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Transition(e) => e.kind(),
            LedgerError::Identity(_) => ErrorKind::IdentityUnavailable,
            LedgerError::Storage(StorageError::AlreadyExists { .. }) => ErrorKind::AlreadyExists,
            LedgerError::Storage(StorageError::BatchNotFound { .. }) => ErrorKind::NotFound,
            LedgerError::Storage(StorageError::ConcurrentConflict { .. }) => ErrorKind::Conflict,
            LedgerError::Storage(StorageError::Backend(_)) => ErrorKind::StoreUnavailable,
            LedgerError::Codec { .. } => ErrorKind::StoreUnavailable,
        }
    }
}
