//! Offline subcommands: operate on the file store directly, without a server.

pub(crate) mod batch;
pub(crate) mod query;

use std::path::Path;
use std::process;
use std::sync::Arc;

use custody_core::{BatchRecord, TransitionEngine};
use custody_ledger::{CustodyLedger, LedgerError};
use custody_storage::{CustodyStorage, FileStorage};

use crate::config::Config;
use crate::{report_error, OutputFormat};

/// Wire a ledger from configuration over `storage`.
pub(crate) fn build_ledger<S: CustodyStorage>(config: &Config, storage: S) -> CustodyLedger<S> {
    CustodyLedger::new(
        storage,
        TransitionEngine::new(config.roles.clone()),
        Arc::new(config.identity_resolver()),
    )
}

/// Everything a single offline command needs.
pub(crate) struct Context {
    runtime: tokio::runtime::Runtime,
    ledger: CustodyLedger<FileStorage>,
    output: OutputFormat,
    quiet: bool,
}

impl Context {
    /// Open the file store, or report and exit.
    pub(crate) fn open(config: &Config, store: &Path, output: OutputFormat, quiet: bool) -> Self {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                report_error(
                    &format!("failed to create tokio runtime: {}", e),
                    output,
                    quiet,
                );
                process::exit(1);
            }
        };
        let storage = match FileStorage::open(store) {
            Ok(s) => s,
            Err(e) => {
                report_error(
                    &format!("error opening store '{}': {}", store.display(), e),
                    output,
                    quiet,
                );
                process::exit(1);
            }
        };
        Self {
            runtime,
            ledger: build_ledger(config, storage),
            output,
            quiet,
        }
    }

    /// Unwrap a ledger result, or report the error with its kind and exit.
    fn finish<T>(&self, result: Result<T, LedgerError>) -> T {
        match result {
            Ok(v) => v,
            Err(e) => {
                let msg = match self.output {
                    OutputFormat::Text => format!("error [{}]: {}", e.kind(), e),
                    OutputFormat::Json => e.to_string(),
                };
                report_error(&msg, self.output, self.quiet);
                process::exit(1);
            }
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization error: {}\"}}", e));
    println!("{}", pretty);
}

/// Multi-line human rendering of one record.
pub(crate) fn render_record(record: &BatchRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}  {} (batch {})\n",
        record.identifier, record.product_name, record.batch_number
    ));
    out.push_str(&format!("  manufacturer:  {}\n", record.manufacturer_name));
    if !record.manufacture_date.is_empty() || !record.expiry_date.is_empty() {
        out.push_str(&format!(
            "  made/expires:  {} / {}\n",
            record.manufacture_date, record.expiry_date
        ));
    }
    if !record.composition.is_empty() {
        out.push_str(&format!("  composition:   {}\n", record.composition));
    }
    out.push_str(&format!("  custodian:     {}\n", record.current_custodian));
    out.push_str(&format!("  status:        {}\n", record.status));
    out.push_str(&format!(
        "  recalled:      {}\n",
        if record.recalled { "yes" } else { "no" }
    ));
    out.push_str("  history:\n");
    for event in &record.history {
        out.push_str(&format!("    {}\n", event));
    }
    if !record.inspection_notes.is_empty() {
        out.push_str("  inspection notes:\n");
        for note in &record.inspection_notes {
            out.push_str(&format!("    {}\n", note));
        }
    }
    out
}
