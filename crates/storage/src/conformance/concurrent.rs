use std::future::Future;
use std::sync::Arc;

use super::{payload, seed, CaseResult};
use crate::{CustodyStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        CaseResult::new(
            "concurrent",
            "concurrent_updates_exactly_one_wins",
            concurrent_updates_exactly_one_wins(factory).await,
        ),
        CaseResult::new(
            "concurrent",
            "concurrent_inserts_exactly_one_wins",
            concurrent_inserts_exactly_one_wins(factory).await,
        ),
        CaseResult::new(
            "concurrent",
            "concurrent_updates_different_batches_all_succeed",
            concurrent_updates_different_batches_all_succeed(factory).await,
        ),
    ]
}

type TaskHandle = tokio::task::JoinHandle<Result<bool, StorageError>>;

/// Tally task outcomes: `Ok(true)` won, `Ok(false)` lost the race.
async fn count_winners(handles: Vec<TaskHandle>) -> Result<(usize, usize), String> {
    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks each open a snapshot and attempt to update the same batch from
/// version 0. Exactly one commit succeeds; the rest must see
/// ConcurrentConflict, either when staging or when committing.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), "DRUG-1", "v0").await?;

    let mut handles: Vec<TaskHandle> = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            match s
                .update_batch(&mut snap, "DRUG-1", 0, payload(&format!("task-{i}")))
                .await
            {
                Ok(_) => {}
                Err(StorageError::ConcurrentConflict { .. }) => {
                    s.abort_snapshot(snap).await?;
                    return Ok(false);
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    return Err(e);
                }
            }
            match s.commit_snapshot(snap).await {
                Ok(()) => Ok(true),
                Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, losers) = count_winners(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let rec = storage
        .get_batch("DRUG-1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("batch missing")?;
    if rec.version != 1 {
        return Err(format!("expected final version 1, got {}", rec.version));
    }
    Ok(())
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

/// N tasks each attempt to insert the same batch. Exactly one succeeds; the
/// rest must get AlreadyExists.
async fn concurrent_inserts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles: Vec<TaskHandle> = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            match s
                .insert_batch(&mut snap, "DRUG-1", payload(&format!("task-{i}")))
                .await
            {
                Ok(()) => {}
                Err(StorageError::AlreadyExists { .. }) => {
                    s.abort_snapshot(snap).await?;
                    return Ok(false);
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    return Err(e);
                }
            }
            match s.commit_snapshot(snap).await {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, losers) = count_winners(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Concurrent updates to different batches: all succeed ────────────────────

/// N tasks each update a different batch. No false conflicts when there is
/// no contention.
async fn concurrent_updates_different_batches_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed(storage.as_ref(), &format!("DRUG-{i}"), "v0").await?;
    }

    let mut handles: Vec<TaskHandle> = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let batch_id = format!("DRUG-{i}");
            let mut snap = s.begin_snapshot().await?;
            s.update_batch(&mut snap, &batch_id, 0, payload("v1"))
                .await?;
            s.commit_snapshot(snap).await?;
            Ok(true)
        }));
    }

    let (winners, _) = count_winners(handles).await?;
    if winners != N {
        return Err(format!("expected {N} successful updates, got {winners}"));
    }
    Ok(())
}
