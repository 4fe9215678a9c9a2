//! Watch command handler
//!
//! Runs until interrupted: probes the server, feeds reachability into the
//! connectivity observer, and retries failed reconnect syncs through the
//! background sync scheduler.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use ponto_core::proxy::{BackgroundSync, SYNC_TAG};
use ponto_core::{ConnectivityObserver, Notifier};

use crate::context::Context;
use crate::notifier::CliNotifier;
use crate::output::Output;

/// Watch connectivity and sync on every reconnect
pub async fn watch(ctx: &Context, output: &Output) -> Result<()> {
    let notifier: Arc<dyn Notifier> =
        Arc::new(CliNotifier::new(*output, ctx.config.app_origin.clone()));
    let proxy = ctx.proxy(notifier.clone())?;
    let reachability = ctx.reachability()?;
    let interval = ctx.config.probe_interval();

    let initially_online = reachability.probe().await;
    let observer = ConnectivityObserver::new(initially_online, ctx.coordinator()?, notifier)
        .with_app_name(ctx.config.app_name.clone());

    let indicator = *output;
    observer.subscribe(move |online| {
        if online {
            indicator.message("● Online");
        } else {
            indicator.warn("Offline: new events will be saved on this device");
        }
    });

    let mut background = BackgroundSync::new(initially_online);
    if ctx.queue.pending_count().await? > 0 {
        background.register(SYNC_TAG);
    }

    output.message(&format!(
        "Watching {} every {}s ({}). Press Ctrl-C to stop.",
        ctx.config.api_url,
        interval.as_secs(),
        if initially_online { "online" } else { "offline" }
    ));
    info!(api_url = %ctx.config.api_url, online = initially_online, "Watching connectivity");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (sync_tx, mut sync_rx) = mpsc::unbounded_channel();

    let monitor = reachability.run(&observer, interval, shutdown_rx.clone(), move |result| {
        let _ = sync_tx.send(result);
    });

    let mut scheduler_shutdown = shutdown_rx;
    let scheduler = async {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                Some(result) = sync_rx.recv() => {
                    output.print_sync_result(&result);
                    if !result.is_success() {
                        background.register(SYNC_TAG);
                    }
                }
                _ = ticker.tick() => {
                    background.set_online(observer.is_online());
                    for outcome in background.dispatch(&proxy, Instant::now()).await {
                        output.print_dispatch(&outcome);
                    }
                }
                changed = scheduler_shutdown.changed() => {
                    if changed.is_err() || *scheduler_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    };

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
        let _ = shutdown_tx.send(true);
    };

    tokio::join!(monitor, scheduler, interrupt);

    let pending = ctx.queue.pending_count().await?;
    output.message(&format!("Stopped. {} event(s) still pending.", pending));
    Ok(())
}
