//! Transition engine.
//!
//! Pure decision logic for the custody state machine. Each operation takes
//! the caller's resolved role, the batch identifier, the currently persisted
//! record (if any) and the operation arguments, and either returns the next
//! record together with the history event it appended, or a rejection.
//!
//! Checks run in a fixed order:
//! 1. Argument validation
//! 2. Fixed-role authorization (register, recall)
//! 3. Record presence (or absence, for register)
//! 4. Custodian authorization (transfer, deliver)
//! 5. Status policy
//!
//! The engine never mutates the record it is given. A rejected transition
//! therefore leaves the caller's copy exactly as it was.
//!
//! Status machine:
//!
//! ```text
//! InProduction --transfer--> InTransit --transfer--> InTransit
//!                            InTransit --deliver---> Delivered
//! any status   --recall----> Recalled   (absorbing)
//! ```

use crate::error::TransitionError;
use crate::log::AppendLog;
use crate::record::{BatchRecord, BatchStatus, EventKind, HistoryEvent, NewBatch, NO_PARTY};
use crate::roles::{CustodyOperation, RoleRegistry};

/// Result of an accepted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub operation: CustodyOperation,
    /// The record to persist.
    pub record: BatchRecord,
    /// The history event appended to `record.history`.
    pub event: HistoryEvent,
}

#[derive(Debug, Clone, Default)]
pub struct TransitionEngine {
    roles: RoleRegistry,
}

impl TransitionEngine {
    pub fn new(roles: RoleRegistry) -> Self {
        Self { roles }
    }

    /// Register a new batch. The caller becomes its first custodian.
    pub fn register(
        &self,
        role: &str,
        existing: Option<&BatchRecord>,
        batch: &NewBatch,
        at: &str,
    ) -> Result<Transition, TransitionError> {
        require_non_empty("identifier", &batch.identifier)?;
        require_non_empty("productName", &batch.product_name)?;
        require_non_empty("batchNumber", &batch.batch_number)?;
        self.authorize(CustodyOperation::Register, &batch.identifier, role, None)?;
        if existing.is_some() {
            return Err(TransitionError::AlreadyExists {
                batch_id: batch.identifier.clone(),
            });
        }

        let event = HistoryEvent {
            timestamp: at.to_string(),
            event_kind: EventKind::Created,
            from_party: role.to_string(),
            to_party: NO_PARTY.to_string(),
            detail: format!("Batch: {}", batch.batch_number),
        };
        let mut history = AppendLog::new();
        history.append(event.clone());

        let record = BatchRecord {
            identifier: batch.identifier.clone(),
            product_name: batch.product_name.clone(),
            manufacturer_name: role.to_string(),
            batch_number: batch.batch_number.clone(),
            manufacture_date: batch.manufacture_date.clone(),
            expiry_date: batch.expiry_date.clone(),
            composition: batch.composition.clone(),
            current_custodian: role.to_string(),
            status: BatchStatus::InProduction,
            recalled: false,
            history,
            inspection_notes: AppendLog::new(),
        };

        Ok(Transition {
            operation: CustodyOperation::Register,
            record,
            event,
        })
    }

    /// Hand the batch from its current custodian to `to`.
    pub fn transfer_custody(
        &self,
        role: &str,
        batch_id: &str,
        current: Option<&BatchRecord>,
        to: &str,
        at: &str,
    ) -> Result<Transition, TransitionError> {
        let operation = CustodyOperation::TransferCustody;
        require_non_empty("identifier", batch_id)?;
        require_non_empty("to", to)?;
        let current = require_record(batch_id, current)?;
        self.authorize(operation, batch_id, role, Some(current))?;

        if current.is_recalled() {
            return Err(invalid_state(operation, current, "batch has been recalled"));
        }
        if current.status == BatchStatus::Delivered {
            return Err(invalid_state(
                operation,
                current,
                "delivery has already been confirmed",
            ));
        }
        if to == current.current_custodian {
            return Err(TransitionError::InvalidArgument {
                field: "to".to_string(),
                reason: format!("'{}' already holds batch {}", to, batch_id),
            });
        }

        let mut record = current.clone();
        let event = HistoryEvent {
            timestamp: at.to_string(),
            event_kind: EventKind::Shipped,
            from_party: current.current_custodian.clone(),
            to_party: to.to_string(),
            detail: String::new(),
        };
        record.current_custodian = to.to_string();
        record.status = BatchStatus::InTransit;
        record.history.append(event.clone());

        Ok(Transition {
            operation,
            record,
            event,
        })
    }

    /// Confirm receipt by the current custodian, ending the nominal path.
    pub fn mark_delivered(
        &self,
        role: &str,
        batch_id: &str,
        current: Option<&BatchRecord>,
        at: &str,
    ) -> Result<Transition, TransitionError> {
        let operation = CustodyOperation::MarkDelivered;
        require_non_empty("identifier", batch_id)?;
        let current = require_record(batch_id, current)?;
        self.authorize(operation, batch_id, role, Some(current))?;

        if current.is_recalled() {
            return Err(invalid_state(operation, current, "batch has been recalled"));
        }
        if current.status != BatchStatus::InTransit {
            return Err(invalid_state(
                operation,
                current,
                "only a batch in transit can be delivered",
            ));
        }

        let mut record = current.clone();
        let event = HistoryEvent {
            timestamp: at.to_string(),
            event_kind: EventKind::Delivered,
            from_party: current.current_custodian.clone(),
            to_party: NO_PARTY.to_string(),
            detail: String::new(),
        };
        record.status = BatchStatus::Delivered;
        record.history.append(event.clone());

        Ok(Transition {
            operation,
            record,
            event,
        })
    }

    /// Recall the batch. Independent of custodian and status; recalling an
    /// already recalled batch only appends another note and event.
    pub fn recall(
        &self,
        role: &str,
        batch_id: &str,
        current: Option<&BatchRecord>,
        reason: &str,
        at: &str,
    ) -> Result<Transition, TransitionError> {
        let operation = CustodyOperation::Recall;
        require_non_empty("identifier", batch_id)?;
        require_non_empty("reason", reason)?;
        self.authorize(operation, batch_id, role, None)?;
        let current = require_record(batch_id, current)?;

        let mut record = current.clone();
        let event = HistoryEvent {
            timestamp: at.to_string(),
            event_kind: EventKind::Recalled,
            from_party: role.to_string(),
            to_party: NO_PARTY.to_string(),
            detail: format!("Reason: {}", reason),
        };
        record.recalled = true;
        record.status = BatchStatus::Recalled;
        record.inspection_notes.append(format!("{}: {}", at, reason));
        record.history.append(event.clone());

        Ok(Transition {
            operation,
            record,
            event,
        })
    }

    /// Read access is unrestricted.
    pub fn track<'a>(
        &self,
        batch_id: &str,
        current: Option<&'a BatchRecord>,
    ) -> Result<&'a BatchRecord, TransitionError> {
        require_record(batch_id, current)
    }

    fn authorize(
        &self,
        operation: CustodyOperation,
        batch_id: &str,
        role: &str,
        record: Option<&BatchRecord>,
    ) -> Result<(), TransitionError> {
        self.roles
            .authorize(operation, role, record)
            .map_err(|required| TransitionError::Unauthorized {
                operation,
                batch_id: batch_id.to_string(),
                role: role.to_string(),
                required,
            })
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), TransitionError> {
    if value.trim().is_empty() {
        return Err(TransitionError::InvalidArgument {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn require_record<'a>(
    batch_id: &str,
    current: Option<&'a BatchRecord>,
) -> Result<&'a BatchRecord, TransitionError> {
    current.ok_or_else(|| TransitionError::NotFound {
        batch_id: batch_id.to_string(),
    })
}

fn invalid_state(
    operation: CustodyOperation,
    record: &BatchRecord,
    reason: &str,
) -> TransitionError {
    TransitionError::InvalidState {
        operation,
        batch_id: record.identifier.clone(),
        status: record.status,
        reason: reason.to_string(),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const AT: &str = "2025-03-01 10:00:00";

    fn engine() -> TransitionEngine {
        TransitionEngine::new(RoleRegistry::new("Cipla", "CDSCO"))
    }

    fn new_batch(id: &str) -> NewBatch {
        NewBatch {
            identifier: id.to_string(),
            product_name: "ParacetamolX".to_string(),
            batch_number: "B100".to_string(),
            manufacture_date: "2025-01-01".to_string(),
            expiry_date: "2027-01-01".to_string(),
            composition: "Paracetamol 500mg".to_string(),
        }
    }

    fn registered() -> BatchRecord {
        engine()
            .register("Cipla", None, &new_batch("DRUG-1"), AT)
            .unwrap()
            .record
    }

    fn shipped_to(to: &str) -> BatchRecord {
        engine()
            .transfer_custody("Cipla", "DRUG-1", Some(&registered()), to, AT)
            .unwrap()
            .record
    }

    #[test]
    fn register_sets_initial_state() {
        let t = engine()
            .register("Cipla", None, &new_batch("DRUG-1"), AT)
            .unwrap();
        assert_eq!(t.record.status, BatchStatus::InProduction);
        assert_eq!(t.record.current_custodian, "Cipla");
        assert_eq!(t.record.manufacturer_name, "Cipla");
        assert!(!t.record.recalled);
        assert_eq!(t.record.history.len(), 1);
        assert_eq!(t.event.event_kind, EventKind::Created);
        assert_eq!(t.event.to_party, NO_PARTY);
        assert_eq!(t.event.detail, "Batch: B100");
        assert!(t.record.inspection_notes.is_empty());
    }

    #[test]
    fn register_rejects_non_manufacturer() {
        let err = engine()
            .register("Medlife", None, &new_batch("DRUG-1"), AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn register_rejects_existing_identifier() {
        let existing = registered();
        let err = engine()
            .register("Cipla", Some(&existing), &new_batch("DRUG-1"), AT)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::AlreadyExists {
                batch_id: "DRUG-1".to_string()
            }
        );
    }

    #[test]
    fn register_rejects_blank_identifier() {
        let err = engine()
            .register("Cipla", None, &new_batch("  "), AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn transfer_moves_custody_and_appends_shipped() {
        let before = registered();
        let t = engine()
            .transfer_custody("Cipla", "DRUG-1", Some(&before), "DistributorA", AT)
            .unwrap();
        assert_eq!(t.record.current_custodian, "DistributorA");
        assert_eq!(t.record.status, BatchStatus::InTransit);
        assert_eq!(t.record.history.len(), 2);
        assert_eq!(t.event.from_party, "Cipla");
        assert_eq!(t.event.to_party, "DistributorA");
        assert!(t.record.history.extends(&before.history));
        assert!(t.record.same_attributes(&before));
    }

    #[test]
    fn transfer_by_non_custodian_leaves_record_unchanged() {
        let before = registered();
        let snapshot = before.clone();
        let err = engine()
            .transfer_custody("CDSCO", "DRUG-1", Some(&before), "DistributorB", AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(before, snapshot);
    }

    #[test]
    fn transfer_uses_exact_role_equality() {
        let before = registered();
        let err = engine()
            .transfer_custody("CiplaMSP", "DRUG-1", Some(&before), "DistributorA", AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn transfer_missing_batch_is_not_found() {
        let err = engine()
            .transfer_custody("Cipla", "DRUG-404", None, "DistributorA", AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn onward_transfer_from_in_transit() {
        let held = shipped_to("Medlife");
        let t = engine()
            .transfer_custody("Medlife", "DRUG-1", Some(&held), "Apollo", AT)
            .unwrap();
        assert_eq!(t.record.current_custodian, "Apollo");
        assert_eq!(t.record.status, BatchStatus::InTransit);
        assert_eq!(t.record.history.len(), 3);
    }

    #[test]
    fn transfer_to_current_custodian_is_rejected() {
        let err = engine()
            .transfer_custody("Cipla", "DRUG-1", Some(&registered()), "Cipla", AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn transfer_of_recalled_batch_is_invalid_state() {
        let recalled = engine()
            .recall("CDSCO", "DRUG-1", Some(&registered()), "contamination", AT)
            .unwrap()
            .record;
        let err = engine()
            .transfer_custody("Cipla", "DRUG-1", Some(&recalled), "DistributorA", AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn recalled_status_blocks_shipment_even_without_flag() {
        let mut record = registered();
        record.status = BatchStatus::Recalled;
        let err = engine()
            .transfer_custody("Cipla", "DRUG-1", Some(&record), "DistributorA", AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = engine()
            .mark_delivered("Cipla", "DRUG-1", Some(&record), AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn deliver_requires_in_transit() {
        let err = engine()
            .mark_delivered("Cipla", "DRUG-1", Some(&registered()), AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let held = shipped_to("Apollo");
        let t = engine()
            .mark_delivered("Apollo", "DRUG-1", Some(&held), AT)
            .unwrap();
        assert_eq!(t.record.status, BatchStatus::Delivered);
        assert_eq!(t.event.event_kind, EventKind::Delivered);
        assert_eq!(t.record.current_custodian, "Apollo");
    }

    #[test]
    fn deliver_by_non_custodian_is_unauthorized() {
        let held = shipped_to("Apollo");
        let err = engine()
            .mark_delivered("Cipla", "DRUG-1", Some(&held), AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn delivered_batch_cannot_be_shipped_again() {
        let held = shipped_to("Apollo");
        let delivered = engine()
            .mark_delivered("Apollo", "DRUG-1", Some(&held), AT)
            .unwrap()
            .record;
        let err = engine()
            .transfer_custody("Apollo", "DRUG-1", Some(&delivered), "Medlife", AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn recall_ignores_custodian_and_status() {
        let held = shipped_to("DistributorA");
        let t = engine()
            .recall("CDSCO", "DRUG-1", Some(&held), "contamination", AT)
            .unwrap();
        assert!(t.record.recalled);
        assert_eq!(t.record.status, BatchStatus::Recalled);
        assert_eq!(t.record.current_custodian, "DistributorA");
        assert_eq!(t.record.inspection_notes.len(), 1);
        assert_eq!(
            t.record.inspection_notes[0],
            format!("{}: contamination", AT)
        );
        assert_eq!(t.record.history.len(), 3);
        assert_eq!(t.event.from_party, "CDSCO");
        assert_eq!(t.event.detail, "Reason: contamination");
    }

    #[test]
    fn recall_by_non_regulator_is_unauthorized() {
        let err = engine()
            .recall("Cipla", "DRUG-1", Some(&registered()), "contamination", AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn recall_missing_batch_is_not_found() {
        let err = engine()
            .recall("CDSCO", "DRUG-404", None, "contamination", AT)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotFound {
                batch_id: "DRUG-404".to_string()
            }
        );
    }

    #[test]
    fn repeated_recall_appends_without_regressing() {
        let first = engine()
            .recall("CDSCO", "DRUG-1", Some(&registered()), "contamination", AT)
            .unwrap()
            .record;
        let second = engine()
            .recall("CDSCO", "DRUG-1", Some(&first), "mislabelled", AT)
            .unwrap()
            .record;
        assert!(second.recalled);
        assert_eq!(second.status, BatchStatus::Recalled);
        assert_eq!(second.inspection_notes.len(), 2);
        assert_eq!(second.history.len(), 3);
        assert!(second.history.extends(&first.history));
        assert_eq!(second.current_custodian, first.current_custodian);
    }

    #[test]
    fn recalled_batch_cannot_be_delivered() {
        let held = shipped_to("Apollo");
        let recalled = engine()
            .recall("CDSCO", "DRUG-1", Some(&held), "contamination", AT)
            .unwrap()
            .record;
        let err = engine()
            .mark_delivered("Apollo", "DRUG-1", Some(&recalled), AT)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn track_returns_record_verbatim() {
        let record = registered();
        assert_eq!(engine().track("DRUG-1", Some(&record)).unwrap(), &record);
        assert_eq!(
            engine().track("DRUG-404", None).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
