use std::fmt;

use crate::record::BatchStatus;
use crate::roles::CustodyOperation;

/// Flat classification of every failure a custody operation can surface.
///
/// Transport layers (HTTP, CLI) map on this rather than on the concrete
/// error types of each crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    AlreadyExists,
    NotFound,
    InvalidState,
    InvalidArgument,
    Conflict,
    IdentityUnavailable,
    StoreUnavailable,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::IdentityUnavailable => "IdentityUnavailable",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection of a transition by the engine.
///
/// A rejected transition produces no new record; the input record is left
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The caller's role does not satisfy the operation's role requirement.
    #[error("role '{role}' is not authorized to {operation} batch {batch_id}: requires '{required}'")]
    Unauthorized {
        operation: CustodyOperation,
        batch_id: String,
        role: String,
        required: String,
    },

    /// A batch with this identifier is already registered.
    #[error("batch {batch_id} already exists")]
    AlreadyExists { batch_id: String },

    /// No batch is registered under this identifier.
    #[error("batch {batch_id} not found")]
    NotFound { batch_id: String },

    /// The operation is not permitted from the batch's current status.
    #[error("cannot {operation} batch {batch_id} while {status}: {reason}")]
    InvalidState {
        operation: CustodyOperation,
        batch_id: String,
        status: BatchStatus,
        reason: String,
    },

    /// A supplied argument is malformed.
    #[error("invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },
}

impl TransitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransitionError::Unauthorized { .. } => ErrorKind::Unauthorized,
            TransitionError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            TransitionError::NotFound { .. } => ErrorKind::NotFound,
            TransitionError::InvalidState { .. } => ErrorKind::InvalidState,
            TransitionError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
        }
    }
}
