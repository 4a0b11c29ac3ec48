//! Custody ledger service.
//!
//! Ties the pure transition engine to a [`CustodyStorage`] backend: callers
//! present a credential, the ledger resolves it to a role, lets the engine
//! decide, persists the result atomically and then notifies subscribers.
//!
//! [`CustodyStorage`]: custody_storage::CustodyStorage

mod error;
mod identity;
mod ledger;
mod notify;

pub use error::LedgerError;
pub use identity::{IdentityError, IdentityResolver, StaticIdentityResolver};
pub use ledger::{BatchFilter, CustodyLedger};
pub use notify::{
    event_name, BroadcastNotifier, EventNotifier, LedgerEvent, NotifyError,
    TracingNotifier, BATCH_DELIVERED, BATCH_RECALLED, BATCH_REGISTERED, CUSTODY_TRANSFERRED,
};
