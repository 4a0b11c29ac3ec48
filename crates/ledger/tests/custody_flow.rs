//! End-to-end custody flows through the ledger service.

use std::sync::Arc;

use custody_core::{
    BatchStatus, ErrorKind, EventKind, FixedClock, NewBatch, RoleRegistry, TransitionEngine,
};
use custody_ledger::{
    BatchFilter, BroadcastNotifier, CustodyLedger, EventNotifier, LedgerEvent, NotifyError,
    StaticIdentityResolver, BATCH_RECALLED, BATCH_REGISTERED, CUSTODY_TRANSFERRED,
};
use custody_storage::{CustodyStorage, FileStorage, MemoryStorage};

const AT: &str = "2025-03-01 10:00:00";

fn identities() -> Arc<StaticIdentityResolver> {
    Arc::new(
        StaticIdentityResolver::new()
            .with("CiplaMSP", "Cipla")
            .with("CDSCOMSP", "CDSCO")
            .with("DistAMSP", "DistributorA")
            .with("MedlifeMSP", "Medlife")
            .with("ApolloMSP", "Apollo"),
    )
}

fn ledger_over<S: CustodyStorage>(storage: S) -> CustodyLedger<S> {
    CustodyLedger::new(
        storage,
        TransitionEngine::new(RoleRegistry::new("Cipla", "CDSCO")),
        identities(),
    )
    .with_clock(Arc::new(FixedClock::new(AT)))
}

fn ledger() -> CustodyLedger<MemoryStorage> {
    ledger_over(MemoryStorage::new())
}

fn paracetamol(id: &str) -> NewBatch {
    NewBatch {
        identifier: id.to_string(),
        product_name: "ParacetamolX".to_string(),
        batch_number: "B100".to_string(),
        manufacture_date: "2025-01-01".to_string(),
        expiry_date: "2027-01-01".to_string(),
        composition: "Paracetamol 500mg".to_string(),
    }
}

// ──────────────────────────────────────────────
// Nominal lifecycle
// ──────────────────────────────────────────────

#[tokio::test]
async fn register_creates_batch_in_production() {
    let ledger = ledger();
    let record = ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();

    assert_eq!(record.status, BatchStatus::InProduction);
    assert_eq!(record.current_custodian, "Cipla");
    assert_eq!(record.manufacturer_name, "Cipla");
    assert_eq!(record.history.len(), 1);
    assert_eq!(record.history[0].event_kind, EventKind::Created);
    assert_eq!(record.history[0].to_party, "-");
    assert_eq!(record.history[0].timestamp, AT);

    assert_eq!(ledger.track("DRUG-1").await.unwrap(), record);
}

#[tokio::test]
async fn transfer_moves_custody_to_distributor() {
    let ledger = ledger();
    ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();

    let record = ledger
        .transfer_custody("CiplaMSP", "DRUG-1", "DistributorA")
        .await
        .unwrap();
    assert_eq!(record.current_custodian, "DistributorA");
    assert_eq!(record.status, BatchStatus::InTransit);
    assert_eq!(record.history.len(), 2);
}

#[tokio::test]
async fn unauthorized_transfer_leaves_stored_document_untouched() {
    let ledger = ledger();
    ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();
    let before = ledger.track_document("DRUG-1").await.unwrap();

    let err = ledger
        .transfer_custody("CDSCOMSP", "DRUG-1", "DistributorB")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(ledger.track_document("DRUG-1").await.unwrap(), before);

    let stored = ledger.storage().get_batch("DRUG-1").await.unwrap().unwrap();
    assert_eq!(stored.version, 0);
}

#[tokio::test]
async fn regulator_recalls_regardless_of_custodian() {
    let ledger = ledger();
    ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();
    ledger
        .transfer_custody("CiplaMSP", "DRUG-1", "DistributorA")
        .await
        .unwrap();

    let record = ledger
        .recall("CDSCOMSP", "DRUG-1", "contamination")
        .await
        .unwrap();
    assert!(record.recalled);
    assert_eq!(record.status, BatchStatus::Recalled);
    assert_eq!(record.current_custodian, "DistributorA");
    assert_eq!(record.inspection_notes.len(), 1);
    assert_eq!(record.history.len(), 3);
}

#[tokio::test]
async fn recall_of_unknown_batch_is_not_found() {
    let err = ledger()
        .recall("CDSCOMSP", "DRUG-404", "contamination")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn onward_shipment_and_delivery() {
    let ledger = ledger();
    ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();
    ledger
        .transfer_custody("CiplaMSP", "DRUG-1", "Medlife")
        .await
        .unwrap();
    ledger
        .transfer_custody("MedlifeMSP", "DRUG-1", "Apollo")
        .await
        .unwrap();
    let delivered = ledger.mark_delivered("ApolloMSP", "DRUG-1").await.unwrap();

    assert_eq!(delivered.status, BatchStatus::Delivered);
    assert_eq!(delivered.current_custodian, "Apollo");
    let kinds: Vec<EventKind> = delivered.history.iter().map(|e| e.event_kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Created,
            EventKind::Shipped,
            EventKind::Shipped,
            EventKind::Delivered
        ]
    );

    let err = ledger
        .transfer_custody("ApolloMSP", "DRUG-1", "Medlife")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

// ──────────────────────────────────────────────
// Invariants
// ──────────────────────────────────────────────

#[tokio::test]
async fn recalled_batch_never_leaves_recalled() {
    let ledger = ledger();
    ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();
    ledger
        .recall("CDSCOMSP", "DRUG-1", "contamination")
        .await
        .unwrap();

    let err = ledger
        .transfer_custody("CiplaMSP", "DRUG-1", "Medlife")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let again = ledger
        .recall("CDSCOMSP", "DRUG-1", "mislabelled")
        .await
        .unwrap();
    assert!(again.recalled);
    assert_eq!(again.status, BatchStatus::Recalled);
    assert_eq!(again.inspection_notes.len(), 2);
}

/// Compare the stored history with the one seen before the last step.
async fn assert_history_step(
    ledger: &CustodyLedger<MemoryStorage>,
    previous: &mut custody_core::AppendLog<custody_core::HistoryEvent>,
    accepted: bool,
) {
    let current = ledger.track("DRUG-1").await.unwrap().history;
    assert!(current.extends(previous));
    if accepted {
        assert_eq!(current.len(), previous.len() + 1);
    } else {
        assert_eq!(&current, previous);
    }
    *previous = current;
}

#[tokio::test]
async fn history_only_grows() {
    let ledger = ledger();
    let mut history = ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap()
        .history;

    let shipped = ledger.transfer_custody("CiplaMSP", "DRUG-1", "Medlife").await;
    assert_history_step(&ledger, &mut history, shipped.is_ok()).await;

    let hijacked = ledger.transfer_custody("CDSCOMSP", "DRUG-1", "Apollo").await;
    assert!(hijacked.is_err());
    assert_history_step(&ledger, &mut history, false).await;

    let onward = ledger.transfer_custody("MedlifeMSP", "DRUG-1", "Apollo").await;
    assert_history_step(&ledger, &mut history, onward.is_ok()).await;

    let recalled = ledger.recall("CDSCOMSP", "DRUG-1", "contamination").await;
    assert_history_step(&ledger, &mut history, recalled.is_ok()).await;

    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let ledger = ledger();
    ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();
    let mut changed = paracetamol("DRUG-1");
    changed.product_name = "Other".to_string();
    let err = ledger.register_batch("CiplaMSP", changed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(
        ledger.track("DRUG-1").await.unwrap().product_name,
        "ParacetamolX"
    );
}

#[tokio::test]
async fn unknown_credential_is_identity_unavailable() {
    let err = ledger()
        .register_batch("Cipla", paracetamol("DRUG-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IdentityUnavailable);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_produce_one_record() {
    let ledger = Arc::new(ledger());
    let mut handles = Vec::new();
    for i in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let mut batch = paracetamol("DRUG-1");
            batch.batch_number = format!("B{i}");
            ledger.register_batch("CiplaMSP", batch).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyExists),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(ledger.track("DRUG-1").await.unwrap().history.len(), 1);
}

// ──────────────────────────────────────────────
// Listing
// ──────────────────────────────────────────────

#[tokio::test]
async fn list_filters_by_status_and_custodian() {
    let ledger = ledger();
    for id in ["DRUG-1", "DRUG-2", "DRUG-3"] {
        ledger.register_batch("CiplaMSP", paracetamol(id)).await.unwrap();
    }
    ledger
        .transfer_custody("CiplaMSP", "DRUG-2", "Medlife")
        .await
        .unwrap();
    ledger
        .recall("CDSCOMSP", "DRUG-3", "contamination")
        .await
        .unwrap();

    let all = ledger.list(&BatchFilter::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["DRUG-1", "DRUG-2", "DRUG-3"]);

    let in_transit = ledger
        .list(&BatchFilter {
            status: Some(BatchStatus::InTransit),
            custodian: None,
        })
        .await
        .unwrap();
    assert_eq!(in_transit.len(), 1);
    assert_eq!(in_transit[0].identifier, "DRUG-2");

    let held_by_cipla = ledger
        .list(&BatchFilter {
            status: None,
            custodian: Some("Cipla".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(held_by_cipla.len(), 2);
}

// ──────────────────────────────────────────────
// Notification
// ──────────────────────────────────────────────

struct FailingNotifier;

impl EventNotifier for FailingNotifier {
    fn emit(&self, event: &LedgerEvent) -> Result<(), NotifyError> {
        Err(NotifyError {
            event: event.name.clone(),
            reason: "subscriber offline".to_string(),
        })
    }
}

#[tokio::test]
async fn notifier_failure_does_not_undo_commit() {
    let ledger = ledger().with_notifier(Arc::new(FailingNotifier));
    ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();
    assert!(ledger.track("DRUG-1").await.is_ok());
}

#[tokio::test]
async fn committed_transitions_are_broadcast_in_order() {
    let notifier = Arc::new(BroadcastNotifier::new(16));
    let mut events = notifier.subscribe();
    let ledger = ledger().with_notifier(notifier);

    ledger
        .register_batch("CiplaMSP", paracetamol("DRUG-1"))
        .await
        .unwrap();
    let _ = ledger
        .transfer_custody("CDSCOMSP", "DRUG-1", "Medlife")
        .await;
    ledger
        .transfer_custody("CiplaMSP", "DRUG-1", "Medlife")
        .await
        .unwrap();
    ledger
        .recall("CDSCOMSP", "DRUG-1", "contamination")
        .await
        .unwrap();

    let names: Vec<String> = [
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
    ]
    .into_iter()
    .map(|e| e.name)
    .collect();
    assert_eq!(
        names,
        vec![BATCH_REGISTERED, CUSTODY_TRANSFERRED, BATCH_RECALLED]
    );
    assert!(events.try_recv().is_err());
}

// ──────────────────────────────────────────────
// File backend
// ──────────────────────────────────────────────

#[tokio::test]
async fn file_backed_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");

    {
        let ledger = ledger_over(FileStorage::open(&path).unwrap());
        ledger
            .register_batch("CiplaMSP", paracetamol("DRUG-1"))
            .await
            .unwrap();
        ledger
            .transfer_custody("CiplaMSP", "DRUG-1", "Medlife")
            .await
            .unwrap();
    }

    let reopened = ledger_over(FileStorage::open(&path).unwrap());
    let record = reopened.track("DRUG-1").await.unwrap();
    assert_eq!(record.current_custodian, "Medlife");
    assert_eq!(record.history.len(), 2);

    let stored = reopened.storage().get_batch("DRUG-1").await.unwrap().unwrap();
    assert_eq!(stored.version, 1);
}
