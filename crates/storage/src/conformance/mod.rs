//! Backend-agnostic behaviour checks for `CustodyStorage`.
//!
//! Each case gets a fresh store from the caller's factory and checks one
//! guarantee the ledger relies on:
//!
//! - inserts land at version 0 and duplicates are refused
//! - snapshot writes stay private until commit and vanish on abort
//! - stale versions are refused, and a refused commit applies nothing
//! - racing inserts or updates of one batch have exactly one winner
//! - absent batches read as `None` and update as `BatchNotFound`
//!
//! ```ignore
//! let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
//! assert_eq!(report.failed(), 0, "{report}");
//! ```

mod concurrent;
mod create;
mod error;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use crate::CustodyStorage;

/// Outcome of one conformance case.
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// Group the case belongs to ("create", "snapshot", "version", ...).
    pub category: &'static str,
    pub name: &'static str,
    pub outcome: Result<(), String>,
}

impl CaseResult {
    fn new(category: &'static str, name: &'static str, outcome: Result<(), String>) -> Self {
        Self {
            category,
            name,
            outcome,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Every case outcome of one suite run.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    pub results: Vec<CaseResult>,
}

impl ConformanceReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} of {} storage cases failed",
            self.failed(),
            self.total()
        )?;
        for case in self.failures() {
            if let Err(msg) = &case.outcome {
                writeln!(f, "  {}::{}: {}", case.category, case.name, msg)?;
            }
        }
        Ok(())
    }
}

/// Run every case against a backend. `factory` must return a fresh, empty
/// store on each call.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: CustodyStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut report = ConformanceReport::default();
    report.results.extend(create::run_create_tests(&factory).await);
    report.results.extend(error::run_error_tests(&factory).await);
    report.results.extend(snapshot::run_snapshot_tests(&factory).await);
    report.results.extend(version::run_version_tests(&factory).await);
    report.results.extend(concurrent::run_concurrent_tests(&factory).await);
    report
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Payload bytes tagged so tests can tell writes apart.
fn payload(tag: &str) -> Vec<u8> {
    format!("{{\"tag\":\"{}\"}}", tag).into_bytes()
}

/// Insert and commit a batch, returning an error string on failure.
async fn seed<S: CustodyStorage>(s: &S, batch_id: &str, tag: &str) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_batch(&mut snap, batch_id, payload(tag))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())
}
