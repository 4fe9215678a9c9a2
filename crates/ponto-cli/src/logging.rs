//! Diagnostic logging setup

use std::fs::OpenOptions;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ponto_core::Config;

/// Initialize logging (only if PONTO_LOG is set)
///
/// Logs go to `log_file` when configured, otherwise to stderr so command
/// output on stdout stays clean.
pub fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("PONTO_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!("ponto_core={},ponto_cli={}", log_level, log_level));

    match &config.log_file {
        Some(log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };

            // Ignore error if already initialized
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file)
                .try_init();

            info!("Logging initialized to {:?}", log_path);
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
