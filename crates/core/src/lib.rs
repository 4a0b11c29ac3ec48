//! custody-core: custody state machine for pharmaceutical batches.
//!
//! Holds the batch record model, the append-only log backing its audit
//! trail, the role registry, and the pure transition engine that decides
//! every custody transition. Persistence, identity resolution and event
//! delivery live in other crates; this crate performs no I/O.
//!
//! # Public API
//!
//! - [`TransitionEngine`] -- register, transfer, deliver, recall, track
//! - [`BatchRecord`], [`HistoryEvent`], [`BatchStatus`] -- data model
//! - [`AppendLog`] -- write-once sequence
//! - [`RoleRegistry`] -- configured manufacturer and regulator roles
//! - [`encode_record`] / [`decode_record`] -- state store encoding

pub mod clock;
pub mod codec;
pub mod engine;
pub mod error;
pub mod log;
pub mod record;
pub mod roles;

// ── Convenience re-exports ───────────────────────────────────────────

pub use clock::{format_timestamp, Clock, FixedClock, SystemClock};
pub use codec::{decode_record, encode_record, CodecError};
pub use engine::{Transition, TransitionEngine};
pub use error::{ErrorKind, TransitionError};
pub use log::AppendLog;
pub use record::{BatchRecord, BatchStatus, EventKind, HistoryEvent, NewBatch, NO_PARTY};
pub use roles::{
    CustodyOperation, RoleRegistry, RoleRequirement, DEFAULT_MANUFACTURER_ROLE,
    DEFAULT_REGULATOR_ROLE,
};
