use std::future::Future;

use super::{payload, seed, CaseResult};
use crate::{CustodyStorage, StorageError};

pub(super) async fn run_create_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        CaseResult::new(
            "create",
            "insert_creates_batch_at_version_0",
            insert_creates_batch_at_version_0(factory).await,
        ),
        CaseResult::new(
            "create",
            "insert_preserves_payload_bytes",
            insert_preserves_payload_bytes(factory).await,
        ),
        CaseResult::new(
            "create",
            "double_insert_in_one_snapshot_returns_already_exists",
            double_insert_in_one_snapshot_returns_already_exists(factory).await,
        ),
        CaseResult::new(
            "create",
            "insert_over_committed_batch_returns_already_exists",
            insert_over_committed_batch_returns_already_exists(factory).await,
        ),
        CaseResult::new(
            "create",
            "different_batches_are_independent",
            different_batches_are_independent(factory).await,
        ),
        CaseResult::new(
            "create",
            "list_batches_ordered_by_identifier",
            list_batches_ordered_by_identifier(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn insert_creates_batch_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "a").await?;

    let rec = s
        .get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("batch missing after commit")?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    if rec.batch_id != "DRUG-1" {
        return Err(format!("expected batch_id DRUG-1, got {}", rec.batch_id));
    }
    Ok(())
}

async fn insert_preserves_payload_bytes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let bytes: Vec<u8> = (0u8..=255).collect();
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_batch(&mut snap, "DRUG-1", bytes.clone())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s
        .get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("batch missing after commit")?;
    if rec.payload != bytes {
        return Err("payload bytes changed in storage".to_string());
    }
    Ok(())
}

async fn double_insert_in_one_snapshot_returns_already_exists<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_batch(&mut snap, "DRUG-1", payload("a"))
        .await
        .map_err(|e| e.to_string())?;
    match s.insert_batch(&mut snap, "DRUG-1", payload("b")).await {
        Err(StorageError::AlreadyExists { batch_id }) if batch_id == "DRUG-1" => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("second insert in one snapshot succeeded".to_string()),
    }
}

async fn insert_over_committed_batch_returns_already_exists<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "a").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    match s.insert_batch(&mut snap, "DRUG-1", payload("b")).await {
        Err(StorageError::AlreadyExists { .. }) => {}
        Err(e) => return Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => return Err("insert over committed batch succeeded".to_string()),
    }

    let rec = s
        .get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("batch missing")?;
    if rec.payload != payload("a") {
        return Err("rejected insert overwrote the committed payload".to_string());
    }
    Ok(())
}

async fn different_batches_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "a").await?;
    seed(&s, "DRUG-2", "b").await?;

    let a = s.get_batch("DRUG-1").await.map_err(|e| e.to_string())?;
    let b = s.get_batch("DRUG-2").await.map_err(|e| e.to_string())?;
    match (a, b) {
        (Some(a), Some(b)) if a.payload == payload("a") && b.payload == payload("b") => Ok(()),
        _ => Err("batches DRUG-1 and DRUG-2 not stored independently".to_string()),
    }
}

async fn list_batches_ordered_by_identifier<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-3", "c").await?;
    seed(&s, "DRUG-1", "a").await?;
    seed(&s, "DRUG-2", "b").await?;

    let ids: Vec<String> = s
        .list_batches()
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|b| b.batch_id)
        .collect();
    if ids != ["DRUG-1", "DRUG-2", "DRUG-3"] {
        return Err(format!("expected sorted identifiers, got {:?}", ids));
    }
    Ok(())
}
