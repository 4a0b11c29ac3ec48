use std::future::Future;

use super::{payload, CaseResult};
use crate::{CustodyStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<CaseResult>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        CaseResult::new(
            "error",
            "get_batch_absent_returns_none",
            get_batch_absent_returns_none(factory).await,
        ),
        CaseResult::new(
            "error",
            "get_batch_for_update_absent_returns_none",
            get_batch_for_update_absent_returns_none(factory).await,
        ),
        CaseResult::new(
            "error",
            "update_absent_batch_returns_not_found",
            update_absent_batch_returns_not_found(factory).await,
        ),
        CaseResult::new(
            "error",
            "list_batches_empty_store",
            list_batches_empty_store(factory).await,
        ),
    ]
}

async fn get_batch_absent_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_batch("DRUG-404").await {
        Ok(None) => Ok(()),
        Ok(Some(_)) => Err("absent batch returned a record".to_string()),
        Err(e) => Err(format!("expected Ok(None), got {e}")),
    }
}

async fn get_batch_for_update_absent_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    match s.get_batch_for_update(&mut snap, "DRUG-404").await {
        Ok(None) => Ok(()),
        Ok(Some(_)) => Err("absent batch returned a record".to_string()),
        Err(e) => Err(format!("expected Ok(None), got {e}")),
    }
}

async fn update_absent_batch_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    match s
        .update_batch(&mut snap, "DRUG-404", 0, payload("a"))
        .await
    {
        Err(StorageError::BatchNotFound { batch_id }) if batch_id == "DRUG-404" => Ok(()),
        Err(e) => Err(format!("expected BatchNotFound, got {e}")),
        Ok(v) => Err(format!("update of absent batch returned version {v}")),
    }
}

async fn list_batches_empty_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let listed = s.list_batches().await.map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("expected no batches, got {}", listed.len()));
    }
    Ok(())
}
