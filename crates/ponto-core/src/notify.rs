//! User-visible notifications
//!
//! The subsystem never renders anything itself. It hands `Notification`s
//! to a `Notifier`, which the embedding application implements.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Icon shown with notifications
pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";

/// Small monochrome badge shown with notifications
pub const DEFAULT_BADGE: &str = "/icons/icon-72x72.png";

/// Body used when a push payload carries none
pub const DEFAULT_BODY: &str = "New notification";

/// A transient message for the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Arbitrary payload echoed back when the notification is clicked
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_BADGE.to_string(),
            data: serde_json::Value::Null,
        }
    }

    /// Build a notification from a push payload
    ///
    /// `title` and `body` come from the payload when present. The whole
    /// payload is kept as `data`.
    pub fn from_push(payload: Option<&serde_json::Value>, default_title: &str) -> Self {
        let field = |name: &str| {
            payload
                .and_then(|p| p.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let mut notification = Self::new(
            field("title").unwrap_or_else(|| default_title.to_string()),
            field("body").unwrap_or_else(|| DEFAULT_BODY.to_string()),
        );
        if let Some(payload) = payload {
            notification.data = payload.clone();
        }
        notification
    }
}

/// Surface for notifications and window focus
pub trait Notifier: Send + Sync {
    /// Show a notification
    fn show(&self, notification: &Notification);

    /// Bring an application window showing `url` to the foreground
    fn focus(&self, url: &str);
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, notification: &Notification) {
        info!(title = %notification.title, body = %notification.body, "Notification");
    }

    fn focus(&self, url: &str) {
        info!(url, "Focus requested");
    }
}
