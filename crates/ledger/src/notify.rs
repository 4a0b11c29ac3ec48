//! Best-effort notification of committed transitions.
//!
//! Notifiers run after the state store has committed. A failing notifier is
//! logged and otherwise ignored; it never undoes the committed change.

use serde::Serialize;
use tokio::sync::broadcast;

use custody_core::{CustodyOperation, HistoryEvent};

pub const BATCH_REGISTERED: &str = "BatchRegistered";
pub const CUSTODY_TRANSFERRED: &str = "CustodyTransferred";
pub const BATCH_DELIVERED: &str = "BatchDelivered";
pub const BATCH_RECALLED: &str = "BatchRecalled";

/// Event name emitted after `operation` commits. Reads emit nothing.
pub fn event_name(operation: CustodyOperation) -> Option<&'static str> {
    match operation {
        CustodyOperation::Register => Some(BATCH_REGISTERED),
        CustodyOperation::TransferCustody => Some(CUSTODY_TRANSFERRED),
        CustodyOperation::MarkDelivered => Some(BATCH_DELIVERED),
        CustodyOperation::Recall => Some(BATCH_RECALLED),
        CustodyOperation::Track => None,
    }
}

/// A committed transition, as delivered to notifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub name: String,
    pub batch_id: String,
    pub event: HistoryEvent,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to deliver {event}: {reason}")]
pub struct NotifyError {
    pub event: String,
    pub reason: String,
}

pub trait EventNotifier: Send + Sync {
    fn emit(&self, event: &LedgerEvent) -> Result<(), NotifyError>;
}

/// Writes every event to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl EventNotifier for TracingNotifier {
    fn emit(&self, event: &LedgerEvent) -> Result<(), NotifyError> {
        tracing::info!(
            target: "custody::events",
            name = %event.name,
            batch_id = %event.batch_id,
            from = %event.event.from_party,
            to = %event.event.to_party,
            "{}",
            event.event
        );
        Ok(())
    }
}

/// Fans events out to in-process subscribers.
///
/// Events emitted while nobody is subscribed are dropped. A subscriber that
/// falls more than `capacity` events behind loses the oldest ones.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<LedgerEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}

impl EventNotifier for BroadcastNotifier {
    fn emit(&self, event: &LedgerEvent) -> Result<(), NotifyError> {
        // Only fails when there are no receivers.
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
