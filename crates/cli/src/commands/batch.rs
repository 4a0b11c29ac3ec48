//! Mutating subcommands: register, ship, deliver, recall.

use custody_core::{BatchRecord, NewBatch};

use super::{print_json, render_record, Context};
use crate::OutputFormat;

pub(crate) fn cmd_register(ctx: &Context, credential: &str, batch: NewBatch) {
    let result = ctx
        .runtime
        .block_on(ctx.ledger.register_batch(credential, batch));
    let record = ctx.finish(result);
    report_success(ctx, &record, "Registered");
}

pub(crate) fn cmd_ship(ctx: &Context, credential: &str, batch_id: &str, to: &str) {
    let result = ctx
        .runtime
        .block_on(ctx.ledger.transfer_custody(credential, batch_id, to));
    let record = ctx.finish(result);
    report_success(ctx, &record, "Shipped");
}

pub(crate) fn cmd_deliver(ctx: &Context, credential: &str, batch_id: &str) {
    let result = ctx
        .runtime
        .block_on(ctx.ledger.mark_delivered(credential, batch_id));
    let record = ctx.finish(result);
    report_success(ctx, &record, "Delivered");
}

pub(crate) fn cmd_recall(ctx: &Context, credential: &str, batch_id: &str, reason: &str) {
    let result = ctx
        .runtime
        .block_on(ctx.ledger.recall(credential, batch_id, reason));
    let record = ctx.finish(result);
    report_success(ctx, &record, "Recalled");
}

/// JSON output always prints the committed record; text output prints a
/// summary line unless `--quiet`.
fn report_success(ctx: &Context, record: &BatchRecord, verb: &str) {
    match ctx.output {
        OutputFormat::Json => print_json(record),
        OutputFormat::Text => {
            if ctx.quiet {
                return;
            }
            println!(
                "{} {}: custodian {}, status {}",
                verb, record.identifier, record.current_custodian, record.status
            );
            print!("{}", render_record(record));
        }
    }
}
