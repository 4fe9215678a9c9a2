//! Caching proxy command handlers

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};

use ponto_core::proxy::{Destination, ProxyRequest};
use ponto_core::CachingProxy;

use crate::context::Context;
use crate::notifier::CliNotifier;
use crate::output::{Output, OutputFormat};

fn open_proxy(ctx: &Context, output: &Output) -> Result<CachingProxy> {
    let notifier = CliNotifier::new(*output, ctx.config.app_origin.clone());
    ctx.proxy(Arc::new(notifier))
}

/// Prime the static generation for the configured version
pub async fn install(ctx: &Context, output: &Output) -> Result<()> {
    let proxy = open_proxy(ctx, output)?;
    output.message(&format!(
        "Installing {} asset(s) from {}...",
        ctx.config.static_manifest.len(),
        ctx.config.app_origin
    ));

    let count = proxy.install().await?;
    output.success(&format!(
        "Installed {} asset(s) into {}",
        count,
        proxy.generations().static_name()
    ));
    Ok(())
}

/// Delete stale generations and start intercepting requests
pub async fn activate(ctx: &Context, output: &Output) -> Result<()> {
    let proxy = open_proxy(ctx, output)?;
    let report = proxy.activate().await?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "version": proxy.generations().version(),
                "deleted": report.deleted
            })
        );
        return Ok(());
    }
    for name in &report.deleted {
        output.message(&format!("Deleted stale generation {}", name));
    }
    output.success(&format!(
        "Proxy active for version {}",
        proxy.generations().version()
    ));
    Ok(())
}

/// List cache generations
pub async fn generations(ctx: &Context, output: &Output) -> Result<()> {
    let proxy = open_proxy(ctx, output)?;
    let names = proxy.cache().generations().await?;
    let set = proxy.generations();

    let mut rows = Vec::with_capacity(names.len());
    for name in &names {
        let entries = proxy.cache().entry_count(name).await?;
        let kind = if set.is_current(name) {
            "current"
        } else if set.owns(name) {
            "stale"
        } else {
            "foreign"
        };
        rows.push((name.as_str(), kind, entries));
    }

    match output.format {
        OutputFormat::Json => {
            let json: Vec<_> = rows
                .iter()
                .map(|(name, kind, entries)| {
                    serde_json::json!({"name": name, "status": kind, "entries": entries})
                })
                .collect();
            output.print_json(&json);
        }
        OutputFormat::Quiet => {
            for (name, _, _) in &rows {
                println!("{}", name);
            }
        }
        OutputFormat::Human => {
            println!("State: {}", proxy.state().await?.as_str());
            if rows.is_empty() {
                println!("No cache generations.");
            }
            for (name, kind, entries) in &rows {
                println!("  {:<28} {:<8} {} entr(ies)", name, kind, entries);
            }
        }
    }
    Ok(())
}

/// Send one request through the proxy and print the response
pub async fn fetch(
    ctx: &Context,
    url: String,
    destination: Option<String>,
    method: String,
    output: &Output,
) -> Result<()> {
    let proxy = open_proxy(ctx, output)?;

    let destination = match destination {
        Some(d) => Destination::from_str(&d).map_err(|e| anyhow!(e))?,
        None => Destination::default(),
    };
    let request = ProxyRequest::get(url)
        .with_method(method)
        .with_destination(destination);

    let response = proxy
        .handle(&request)
        .await
        .with_context(|| format!("Request to {} failed", request.url))?;
    output.print_response(&response);
    Ok(())
}

/// Deliver a push payload as a notification
pub async fn push(ctx: &Context, payload: Option<String>, output: &Output) -> Result<()> {
    let proxy = open_proxy(ctx, output)?;
    let payload = payload
        .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
        .transpose()
        .context("Push payload must be valid JSON")?;

    proxy.on_push(payload.as_ref());
    Ok(())
}

/// Simulate a click on a notification
pub async fn click(ctx: &Context, output: &Output) -> Result<()> {
    let proxy = open_proxy(ctx, output)?;
    let notification = ponto_core::Notification::new(&ctx.config.app_name, "");
    proxy.on_notification_click(&notification);
    Ok(())
}

/// Deliver a background sync signal
pub async fn sync_tag(ctx: &Context, tag: String, output: &Output) -> Result<()> {
    let proxy = open_proxy(ctx, output)?;
    match proxy.on_sync(&tag).await? {
        Some(result) => output.print_sync_result(&result),
        None => output.warn(&format!("No handler for background sync tag '{}'", tag)),
    }
    Ok(())
}
