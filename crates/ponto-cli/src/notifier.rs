//! Terminal notifier

use tracing::{info, warn};

use ponto_core::{Notification, Notifier};

use crate::output::Output;

/// Prints notifications and opens the web app in a browser on focus
pub struct CliNotifier {
    output: Output,
    app_origin: String,
}

impl CliNotifier {
    pub fn new(output: Output, app_origin: impl Into<String>) -> Self {
        Self {
            output,
            app_origin: app_origin.into(),
        }
    }

    fn target(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.app_origin.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }
}

impl Notifier for CliNotifier {
    fn show(&self, notification: &Notification) {
        self.output.print_notification(notification);
    }

    fn focus(&self, url: &str) {
        let target = self.target(url);
        info!(url = %target, "Opening application");
        if let Err(e) = open::that(&target) {
            warn!(url = %target, error = %e, "Failed to open browser");
            self.output.warn(&format!("Could not open {}: {}", target, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    #[test]
    fn test_target_joins_origin() {
        let notifier = CliNotifier::new(Output::new(OutputFormat::Quiet), "http://localhost:3000/");
        assert_eq!(notifier.target("/"), "http://localhost:3000/");
        assert_eq!(notifier.target("/historico"), "http://localhost:3000/historico");
        assert_eq!(notifier.target("https://other/x"), "https://other/x");
    }
}
