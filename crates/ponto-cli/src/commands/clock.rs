//! Clock command handler

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};

use ponto_core::{
    ClockEvent, ClockType, Coordinates, PhotoPayload, RecordError, RecordOutcome, RemoteError,
};

use crate::context::Context;
use crate::output::{Output, OutputFormat};

/// Record a clock event, sending it now or saving it for later
pub async fn record(
    ctx: &Context,
    clock_type: ClockType,
    location: Option<(f64, f64)>,
    photo: Option<PathBuf>,
    offline: bool,
    output: &Output,
) -> Result<()> {
    let mut event = ClockEvent::new(clock_type);
    if let Some((latitude, longitude)) = location {
        event = event.with_coordinates(Coordinates::new(latitude, longitude));
    }
    if let Some(path) = photo {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read photo {}", path.display()))?;
        event = event.with_photo(PhotoPayload::from_bytes(&bytes));
    }

    let online = if offline {
        false
    } else {
        ctx.reachability()?.probe().await
    };

    let recorder = ctx.recorder()?;
    let outcome = match recorder.record(&event, online).await {
        Ok(outcome) => outcome,
        Err(RecordError::Remote(RemoteError::CredentialRejected)) => {
            bail!("Session expired. Sign in again with `ponto auth set-token <token>`");
        }
        Err(RecordError::Storage(e)) => match e.recovery_suggestion() {
            Some(hint) => bail!("Failed to save event: {}\n{}", e, hint),
            None => bail!("Failed to save event: {}", e),
        },
        Err(e) => return Err(e.into()),
    };

    match output.format {
        OutputFormat::Json => {
            let (status, id) = match outcome {
                RecordOutcome::Sent | RecordOutcome::Synced { .. } => ("sent", None),
                RecordOutcome::Queued(id) => ("queued", Some(id)),
            };
            println!(
                "{}",
                serde_json::json!({
                    "clock_type": clock_type,
                    "status": status,
                    "id": id
                })
            );
        }
        OutputFormat::Quiet => {
            if let RecordOutcome::Queued(id) = outcome {
                println!("{}", id);
            }
        }
        OutputFormat::Human => match outcome {
            RecordOutcome::Sent => {
                output.success(&format!("{} registered", clock_type.label()));
            }
            RecordOutcome::Synced {
                synced_count,
                failed_count,
            } => {
                output.success(&format!(
                    "{} registered with {} earlier event(s) from the offline queue",
                    clock_type.label(),
                    synced_count.saturating_sub(1)
                ));
                if failed_count > 0 {
                    output.warn(&format!("{} event(s) were rejected by the server", failed_count));
                }
            }
            RecordOutcome::Queued(id) => {
                output.success(&format!("{} saved offline (#{})", clock_type.label(), id));
                output.message("It will be sent automatically when the connection returns.");
            }
        },
    }

    Ok(())
}
