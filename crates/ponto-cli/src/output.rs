//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use ponto_core::proxy::{DispatchOutcome, ProxyResponse};
use ponto_core::{Notification, PendingEvent, SyncResult};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode output: {}", e),
        }
    }

    /// Print queued events
    pub fn print_events(&self, events: &[PendingEvent]) {
        match self.format {
            OutputFormat::Human => {
                if events.is_empty() {
                    println!("Queue is empty.");
                    return;
                }
                for event in events {
                    let location = match event.coordinates {
                        Some(c) => format!("{:.5}, {:.5}", c.latitude, c.longitude),
                        None => "-".to_string(),
                    };
                    println!(
                        "#{:<5} {} | {:<12} | {:<8} | {:<22} | {}",
                        event.id,
                        event.created_at.format("%Y-%m-%d %H:%M:%S"),
                        event.clock_type.label(),
                        event.sync_status.as_str(),
                        location,
                        if event.photo.is_some() { "photo" } else { "" }
                    );
                }
                let pending = events.iter().filter(|e| e.is_pending()).count();
                println!("\n{} event(s), {} pending", events.len(), pending);
            }
            OutputFormat::Json => self.print_json(events),
            OutputFormat::Quiet => {
                for event in events {
                    println!("{}", event.id);
                }
            }
        }
    }

    /// Print the outcome of a sync pass
    pub fn print_sync_result(&self, result: &SyncResult) {
        match self.format {
            OutputFormat::Human => {
                if result.is_success() {
                    println!("✓ {}", result.message);
                    if result.failed_count > 0 {
                        println!(
                            "⚠ Server rejected {} event(s); they were not kept",
                            result.failed_count
                        );
                    }
                } else {
                    println!("✗ Sync failed: {}", result.message);
                }
            }
            OutputFormat::Json => self.print_json(result),
            OutputFormat::Quiet => {
                if result.is_success() {
                    println!("{}", result.synced_count);
                }
            }
        }
    }

    /// Print a notification as it would be shown to the user
    pub fn print_notification(&self, notification: &Notification) {
        match self.format {
            OutputFormat::Human => println!("🔔 {}: {}", notification.title, notification.body),
            OutputFormat::Json => self.print_json(notification),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a background sync dispatch result
    pub fn print_dispatch(&self, outcome: &DispatchOutcome) {
        let (event, tag, detail) = match outcome {
            DispatchOutcome::Completed { tag } => ("completed", tag, String::new()),
            DispatchOutcome::Rescheduled {
                tag,
                attempts,
                retry_in,
            } => (
                "rescheduled",
                tag,
                format!("attempt {}, retrying in {}s", attempts, retry_in.as_secs()),
            ),
            DispatchOutcome::Dropped { tag, attempts } => {
                ("dropped", tag, format!("gave up after {} attempts", attempts))
            }
        };
        match self.format {
            OutputFormat::Human => {
                if detail.is_empty() {
                    println!("Background sync '{}' {}", tag, event);
                } else {
                    println!("Background sync '{}' {} ({})", tag, event, detail);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"background_sync": tag, "event": event, "detail": detail})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a proxied response
    pub fn print_response(&self, response: &ProxyResponse) {
        match self.format {
            OutputFormat::Human => {
                println!("Status: {}", response.status);
                for (name, value) in &response.headers {
                    println!("{}: {}", name, value);
                }
                println!();
                println!("{}", truncate(&response.text(), 2000));
            }
            OutputFormat::Json => {
                let body = serde_json::from_slice::<serde_json::Value>(&response.body)
                    .unwrap_or_else(|_| serde_json::Value::String(response.text()));
                println!(
                    "{}",
                    serde_json::json!({
                        "status": response.status,
                        "headers": response.headers,
                        "body": body
                    })
                );
            }
            OutputFormat::Quiet => println!("{}", response.status),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (shown unless quiet)
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
