//! Queue command handlers

use anyhow::Result;

use crate::context::Context;
use crate::output::Output;

/// List queued events
pub async fn list(ctx: &Context, pending_only: bool, output: &Output) -> Result<()> {
    let events = if pending_only {
        ctx.queue.list_pending().await?
    } else {
        ctx.queue.list_all().await?
    };
    output.print_events(&events);
    Ok(())
}

/// Remove events already confirmed by the server
pub async fn purge(ctx: &Context, output: &Output) -> Result<()> {
    let report = ctx.queue.purge_synced().await?;

    if report.failed > 0 {
        output.warn(&format!(
            "{} synced event(s) could not be removed and will be retried",
            report.failed
        ));
    }
    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({"removed": report.removed, "failed": report.failed})
        );
    } else if output.is_quiet() {
        println!("{}", report.removed);
    } else {
        output.success(&format!("Removed {} synced event(s)", report.removed));
    }
    Ok(())
}
