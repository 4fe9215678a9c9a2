//! Sync command handler

use anyhow::{bail, Result};

use ponto_core::SyncFailure;

use crate::context::Context;
use crate::output::Output;

/// Push every pending event to the server
pub async fn sync(ctx: &Context, output: &Output) -> Result<()> {
    if !ctx.credentials.is_authenticated() {
        output.warn("No access token stored; the server may reject the request");
    }

    let pending = ctx.queue.pending_count().await?;
    if pending > 0 {
        output.message(&format!("Sending {} pending event(s)...", pending));
    }

    let result = ctx.coordinator()?.synchronize().await;
    output.print_sync_result(&result);

    match result.failure {
        None => Ok(()),
        Some(SyncFailure::CredentialRejected) => {
            bail!("Session expired. Sign in again with `ponto auth set-token <token>`")
        }
        Some(SyncFailure::Transport) => {
            bail!("Server unreachable; events stay queued until the connection returns")
        }
        Some(_) => bail!("Sync failed: {}", result.message),
    }
}
