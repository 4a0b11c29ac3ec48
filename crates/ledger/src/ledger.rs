//! The custody ledger service.
//!
//! Every mutating operation follows the same flow:
//!
//! 1. Resolve the caller's credential to a role
//! 2. Open a storage snapshot and read the current record for update
//! 3. Let the transition engine decide
//! 4. Stage the encoded record (insert or versioned update) and commit
//! 5. Notify, best effort
//!
//! Any failure in steps 2 to 4 aborts the snapshot, so a rejected or failed
//! invocation persists nothing.

use std::sync::Arc;

use serde::Deserialize;

use custody_core::{
    decode_record, encode_record, BatchRecord, BatchStatus, Clock, NewBatch, SystemClock,
    Transition, TransitionEngine, TransitionError,
};
use custody_storage::{CustodyStorage, StoredBatch};

use crate::error::LedgerError;
use crate::identity::IdentityResolver;
use crate::notify::{event_name, EventNotifier, LedgerEvent, TracingNotifier};

/// Optional constraints for [`CustodyLedger::list`]. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchFilter {
    #[serde(default)]
    pub status: Option<BatchStatus>,
    #[serde(default)]
    pub custodian: Option<String>,
}

impl BatchFilter {
    pub fn matches(&self, record: &BatchRecord) -> bool {
        self.status.map_or(true, |s| s == record.status)
            && self
                .custodian
                .as_deref()
                .map_or(true, |c| c == record.current_custodian)
    }
}

pub struct CustodyLedger<S: CustodyStorage> {
    storage: S,
    engine: TransitionEngine,
    identity: Arc<dyn IdentityResolver>,
    notifier: Arc<dyn EventNotifier>,
    clock: Arc<dyn Clock>,
}

impl<S: CustodyStorage> CustodyLedger<S> {
    /// Build a ledger that logs events through `tracing` and stamps history
    /// with the system clock.
    pub fn new(storage: S, engine: TransitionEngine, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            storage,
            engine,
            identity,
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ──────────────────────────────────────────────
    // Mutating operations
    // ──────────────────────────────────────────────

    pub async fn register_batch(
        &self,
        credential: &str,
        batch: NewBatch,
    ) -> Result<BatchRecord, LedgerError> {
        let role = self.identity.resolve(credential).await?;
        let engine = &self.engine;
        self.apply(&batch.identifier, |current, at| {
            engine.register(&role, current, &batch, at)
        })
        .await
    }

    pub async fn transfer_custody(
        &self,
        credential: &str,
        batch_id: &str,
        to: &str,
    ) -> Result<BatchRecord, LedgerError> {
        let role = self.identity.resolve(credential).await?;
        let engine = &self.engine;
        self.apply(batch_id, |current, at| {
            engine.transfer_custody(&role, batch_id, current, to, at)
        })
        .await
    }

    pub async fn mark_delivered(
        &self,
        credential: &str,
        batch_id: &str,
    ) -> Result<BatchRecord, LedgerError> {
        let role = self.identity.resolve(credential).await?;
        let engine = &self.engine;
        self.apply(batch_id, |current, at| {
            engine.mark_delivered(&role, batch_id, current, at)
        })
        .await
    }

    pub async fn recall(
        &self,
        credential: &str,
        batch_id: &str,
        reason: &str,
    ) -> Result<BatchRecord, LedgerError> {
        let role = self.identity.resolve(credential).await?;
        let engine = &self.engine;
        self.apply(batch_id, |current, at| {
            engine.recall(&role, batch_id, current, reason, at)
        })
        .await
    }

    // ──────────────────────────────────────────────
    // Reads
    // ──────────────────────────────────────────────

    /// Current record for `batch_id`. Open to every caller.
    pub async fn track(&self, batch_id: &str) -> Result<BatchRecord, LedgerError> {
        let stored = self.storage.get_batch(batch_id).await?;
        let current = stored.as_ref().map(decode_stored).transpose()?;
        Ok(self.engine.track(batch_id, current.as_ref())?.clone())
    }

    /// Stored document for `batch_id`, byte for byte.
    pub async fn track_document(&self, batch_id: &str) -> Result<Vec<u8>, LedgerError> {
        self.storage
            .get_batch(batch_id)
            .await?
            .map(|s| s.payload)
            .ok_or_else(|| {
                TransitionError::NotFound {
                    batch_id: batch_id.to_string(),
                }
                .into()
            })
    }

    /// Every stored batch matching `filter`, ordered by identifier.
    pub async fn list(&self, filter: &BatchFilter) -> Result<Vec<BatchRecord>, LedgerError> {
        let mut records = Vec::new();
        for stored in self.storage.list_batches().await? {
            let record = decode_stored(&stored)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    // ──────────────────────────────────────────────
    // Snapshot flow
    // ──────────────────────────────────────────────

    async fn apply<F>(&self, batch_id: &str, decide: F) -> Result<BatchRecord, LedgerError>
    where
        F: FnOnce(Option<&BatchRecord>, &str) -> Result<Transition, TransitionError> + Send,
    {
        let mut snapshot = self.storage.begin_snapshot().await?;
        let transition = match self.stage(&mut snapshot, batch_id, decide).await {
            Ok(t) => t,
            Err(e) => {
                if let Err(abort) = self.storage.abort_snapshot(snapshot).await {
                    tracing::warn!(batch_id, error = %abort, "failed to abort snapshot");
                }
                tracing::info!(batch_id, kind = %e.kind(), "custody operation rejected: {e}");
                return Err(e);
            }
        };
        self.storage.commit_snapshot(snapshot).await?;

        tracing::info!(
            batch_id,
            operation = %transition.operation,
            custodian = %transition.record.current_custodian,
            status = %transition.record.status,
            "custody operation committed"
        );
        self.notify(&transition);
        Ok(transition.record)
    }

    async fn stage<F>(
        &self,
        snapshot: &mut S::Snapshot,
        batch_id: &str,
        decide: F,
    ) -> Result<Transition, LedgerError>
    where
        F: FnOnce(Option<&BatchRecord>, &str) -> Result<Transition, TransitionError> + Send,
    {
        let stored = self.storage.get_batch_for_update(snapshot, batch_id).await?;
        let current = stored.as_ref().map(decode_stored).transpose()?;

        let at = self.clock.now();
        let transition = decide(current.as_ref(), &at)?;

        let payload = encode_record(&transition.record).map_err(|source| LedgerError::Codec {
            batch_id: batch_id.to_string(),
            source,
        })?;
        match stored {
            None => {
                self.storage
                    .insert_batch(snapshot, batch_id, payload)
                    .await?;
            }
            Some(s) => {
                self.storage
                    .update_batch(snapshot, batch_id, s.version, payload)
                    .await?;
            }
        }
        Ok(transition)
    }

    fn notify(&self, transition: &Transition) {
        let Some(name) = event_name(transition.operation) else {
            return;
        };
        let event = LedgerEvent {
            name: name.to_string(),
            batch_id: transition.record.identifier.clone(),
            event: transition.event.clone(),
        };
        if let Err(e) = self.notifier.emit(&event) {
            tracing::warn!(batch_id = %event.batch_id, error = %e, "event notification failed");
        }
    }
}

fn decode_stored(stored: &StoredBatch) -> Result<BatchRecord, LedgerError> {
    decode_record(&stored.payload).map_err(|source| LedgerError::Codec {
        batch_id: stored.batch_id.clone(),
        source,
    })
}
