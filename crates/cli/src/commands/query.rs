//! Read-only subcommands: track, list.

use std::io::Write;

use custody_ledger::BatchFilter;

use super::{print_json, render_record, Context};
use crate::OutputFormat;

/// Print one batch. `raw` writes the stored document byte for byte.
pub(crate) fn cmd_track(ctx: &Context, batch_id: &str, raw: bool) {
    if raw {
        let result = ctx.runtime.block_on(ctx.ledger.track_document(batch_id));
        let document = ctx.finish(result);
        let mut stdout = std::io::stdout().lock();
        // A closed pipe is not worth reporting.
        let _ = stdout.write_all(&document);
        let _ = stdout.write_all(b"\n");
        return;
    }

    let result = ctx.runtime.block_on(ctx.ledger.track(batch_id));
    let record = ctx.finish(result);
    match ctx.output {
        OutputFormat::Json => print_json(&record),
        OutputFormat::Text => print!("{}", render_record(&record)),
    }
}

pub(crate) fn cmd_list(ctx: &Context, filter: &BatchFilter) {
    let result = ctx.runtime.block_on(ctx.ledger.list(filter));
    let records = ctx.finish(result);
    match ctx.output {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text => {
            if records.is_empty() {
                if !ctx.quiet {
                    println!("No batches.");
                }
                return;
            }
            for r in &records {
                println!(
                    "{}\t{}\t{}\t{}{}",
                    r.identifier,
                    r.status,
                    r.current_custodian,
                    r.product_name,
                    if r.recalled { "\t[recalled]" } else { "" }
                );
            }
        }
    }
}
