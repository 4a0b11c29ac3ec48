//! Version validation (OCC) conformance tests.

use std::future::Future;

use super::{payload, seed, CaseResult};
use crate::{CustodyStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        CaseResult::new(
            "version",
            "update_returns_incremented_version",
            update_returns_incremented_version(factory).await,
        ),
        CaseResult::new(
            "version",
            "sequential_updates_increment_version",
            sequential_updates_increment_version(factory).await,
        ),
        CaseResult::new(
            "version",
            "stale_version_rejected",
            stale_version_rejected(factory).await,
        ),
        CaseResult::new(
            "version",
            "stale_commit_applies_nothing",
            stale_commit_applies_nothing(factory).await,
        ),
        CaseResult::new(
            "version",
            "racing_insert_commit_returns_already_exists",
            racing_insert_commit_returns_already_exists(factory).await,
        ),
    ]
}

async fn update_returns_incremented_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "a").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let v = s
        .update_batch(&mut snap, "DRUG-1", 0, payload("b"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    if v != 1 {
        return Err(format!("expected new version 1, got {v}"));
    }

    let rec = s
        .get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("batch missing")?;
    if rec.version != 1 || rec.payload != payload("b") {
        return Err(format!("expected committed version 1, got {}", rec.version));
    }
    Ok(())
}

async fn sequential_updates_increment_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "v0").await?;

    for expected in 0..5i64 {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        let current = s
            .get_batch_for_update(&mut snap, "DRUG-1")
            .await
            .map_err(|e| e.to_string())?
            .ok_or("batch missing")?;
        if current.version != expected {
            return Err(format!(
                "expected version {expected} before update, got {}",
                current.version
            ));
        }
        s.update_batch(
            &mut snap,
            "DRUG-1",
            current.version,
            payload(&format!("v{}", expected + 1)),
        )
        .await
        .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    }

    let rec = s
        .get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("batch missing")?;
    if rec.version != 5 || rec.payload != payload("v5") {
        return Err(format!("expected version 5, got {}", rec.version));
    }
    Ok(())
}

async fn stale_version_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "a").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    match s.update_batch(&mut snap, "DRUG-1", 7, payload("b")).await {
        Err(StorageError::ConcurrentConflict {
            batch_id,
            expected_version,
        }) if batch_id == "DRUG-1" && expected_version == 7 => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(v) => Err(format!("stale update succeeded with version {v}")),
    }
}

/// Two snapshots read version 0; the second to commit must fail and leave
/// the first one's write in place.
async fn stale_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "a").await?;
    seed(&s, "DRUG-2", "x").await?;

    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_batch(&mut first, "DRUG-1", 0, payload("first"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_batch(&mut second, "DRUG-1", 0, payload("second"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_batch(&mut second, "DRUG-2", 0, payload("y"))
        .await
        .map_err(|e| e.to_string())?;

    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    match s.commit_snapshot(second).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(()) => return Err("stale snapshot committed".to_string()),
    }

    let one = s
        .get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("DRUG-1 missing")?;
    let two = s
        .get_batch("DRUG-2")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("DRUG-2 missing")?;
    if one.payload != payload("first") {
        return Err("losing commit overwrote the winner".to_string());
    }
    if two.payload != payload("x") || two.version != 0 {
        return Err("failed commit partially applied".to_string());
    }
    Ok(())
}

async fn racing_insert_commit_returns_already_exists<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut first = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut second = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_batch(&mut first, "DRUG-1", payload("first"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_batch(&mut second, "DRUG-1", payload("second"))
        .await
        .map_err(|e| e.to_string())?;

    s.commit_snapshot(first).await.map_err(|e| e.to_string())?;
    match s.commit_snapshot(second).await {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("second insert of the same batch committed".to_string()),
    }
}
