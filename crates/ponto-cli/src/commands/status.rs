//! Status command handler

use std::sync::Arc;

use anyhow::Result;

use ponto_core::LogNotifier;

use crate::context::Context;
use crate::output::{Output, OutputFormat};

/// Show queue, connectivity and proxy state
pub async fn show(ctx: &Context, output: &Output) -> Result<()> {
    let config = &ctx.config;
    let pending = ctx.queue.pending_count().await?;
    let online = ctx.reachability()?.probe().await;
    let authenticated = ctx.credentials.is_authenticated();

    let proxy = ctx.proxy(Arc::new(LogNotifier))?;
    let proxy_state = proxy.state().await?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "online": online,
                    "authenticated": authenticated,
                    "api_url": config.api_url,
                    "queue": {
                        "path": config.queue_path(),
                        "pending": pending
                    },
                    "proxy": {
                        "state": proxy_state.as_str(),
                        "version": config.cache_version,
                        "cache_path": config.cache_path()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", pending);
        }
        OutputFormat::Human => {
            println!("Ponto Status");
            println!("============");
            println!();
            println!("Connection:");
            println!("  Server:  {}", config.api_url);
            println!("  Status:  {}", if online { "online" } else { "offline" });
            println!(
                "  Session: {}",
                if authenticated {
                    "token stored"
                } else {
                    "not signed in"
                }
            );
            println!();
            println!("Queue:");
            println!("  Pending: {}", pending);
            println!("  Path:    {}", config.queue_path().display());
            println!();
            println!("Proxy:");
            println!("  State:   {}", proxy_state.as_str());
            println!("  Version: {}", config.cache_version);
            println!("  Path:    {}", config.cache_path().display());

            if pending > 0 && !online {
                println!();
                println!("Events will be sent when the connection returns.");
            } else if pending > 0 {
                println!();
                println!("Run `ponto sync` to send pending events.");
            }
        }
    }

    Ok(())
}
