//! Snapshot isolation conformance tests.
//!
//! Verifies that uncommitted writes are invisible outside a snapshot, that a
//! snapshot reads its own writes, and that aborted or dropped writes are
//! discarded.

use std::future::Future;

use super::{payload, seed, CaseResult};
use crate::CustodyStorage;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        CaseResult::new(
            "snapshot",
            "uncommitted_insert_invisible_to_get",
            uncommitted_insert_invisible_to_get(factory).await,
        ),
        CaseResult::new(
            "snapshot",
            "uncommitted_insert_invisible_to_list",
            uncommitted_insert_invisible_to_list(factory).await,
        ),
        CaseResult::new(
            "snapshot",
            "snapshot_reads_its_own_insert",
            snapshot_reads_its_own_insert(factory).await,
        ),
        CaseResult::new(
            "snapshot",
            "snapshot_reads_its_own_update",
            snapshot_reads_its_own_update(factory).await,
        ),
        CaseResult::new(
            "snapshot",
            "uncommitted_update_invisible",
            uncommitted_update_invisible(factory).await,
        ),
        CaseResult::new(
            "snapshot",
            "aborted_insert_discarded",
            aborted_insert_discarded(factory).await,
        ),
        CaseResult::new(
            "snapshot",
            "dropped_snapshot_discarded",
            dropped_snapshot_discarded(factory).await,
        ),
        CaseResult::new(
            "snapshot",
            "empty_snapshot_commits",
            empty_snapshot_commits(factory).await,
        ),
    ]
}

async fn uncommitted_insert_invisible_to_get<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let seen = s.get_batch("DRUG-1").await.map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    if seen.is_some() {
        return Err("uncommitted insert visible to get_batch".to_string());
    }
    Ok(())
}

async fn uncommitted_insert_invisible_to_list<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let listed = s.list_batches().await.map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("expected empty list, got {} batches", listed.len()));
    }
    Ok(())
}

async fn snapshot_reads_its_own_insert<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let rec = s
        .get_batch_for_update(&mut snap, "DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("snapshot cannot see its own insert")?;
    if rec.payload != payload("a") || rec.version != 0 {
        return Err(format!(
            "unexpected staged read: version {}, payload {:?}",
            rec.version,
            String::from_utf8_lossy(&rec.payload)
        ));
    }
    Ok(())
}

async fn snapshot_reads_its_own_update<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "a").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_batch(&mut snap, "DRUG-1", 0, payload("b"))
        .await
        .map_err(|e| e.to_string())?;
    let rec = s
        .get_batch_for_update(&mut snap, "DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("batch missing inside snapshot")?;
    if rec.payload != payload("b") || rec.version != 1 {
        return Err(format!(
            "expected staged update at version 1, got version {}",
            rec.version
        ));
    }
    Ok(())
}

async fn uncommitted_update_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "DRUG-1", "a").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_batch(&mut snap, "DRUG-1", 0, payload("b"))
        .await
        .map_err(|e| e.to_string())?;

    let rec = s
        .get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("batch missing")?;
    if rec.payload != payload("a") || rec.version != 0 {
        return Err("uncommitted update visible outside snapshot".to_string());
    }
    Ok(())
}

async fn aborted_insert_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if s.get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("aborted insert visible".to_string());
    }

    // The identifier is free again.
    seed(&s, "DRUG-1", "b").await
}

async fn dropped_snapshot_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.insert_batch(&mut snap, "DRUG-1", payload("a"))
            .await
            .map_err(|e| e.to_string())?;
    }

    if s.get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .is_some()
    {
        return Err("dropped snapshot's insert visible".to_string());
    }
    Ok(())
}

async fn empty_snapshot_commits<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}
