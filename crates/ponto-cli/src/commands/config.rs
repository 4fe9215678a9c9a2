//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use ponto_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, api_url, api_prefix, app_origin, cache_prefix, cache_version, \
                          offline_page, request_timeout_secs, strict_ack, probe_interval_secs, \
                          app_name, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => output.print_json(&config),
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!("  api_url:              {}", config.api_url);
            println!("  api_prefix:           {}", config.api_prefix);
            println!("  app_origin:           {}", config.app_origin);
            println!("  cache_prefix:         {}", config.cache_prefix);
            println!("  cache_version:        {}", config.cache_version);
            println!("  offline_page:         {}", config.offline_page);
            println!("  static_manifest:      {} path(s)", config.static_manifest.len());
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!("  strict_ack:           {}", config.strict_ack);
            println!("  probe_interval_secs:  {}", config.probe_interval_secs);
            println!("  app_name:             {}", config.app_name);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "api_url" => {
            if value.is_empty() {
                bail!("api_url cannot be empty");
            }
            config.api_url = value.trim_end_matches('/').to_string();
        }
        "api_prefix" => config.api_prefix = value.to_string(),
        "app_origin" => config.app_origin = value.trim_end_matches('/').to_string(),
        "cache_prefix" => config.cache_prefix = value.to_string(),
        "cache_version" => config.cache_version = value.to_string(),
        "offline_page" => config.offline_page = value.to_string(),
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use a number of seconds.")?;
        }
        "strict_ack" => {
            config.strict_ack = value
                .parse()
                .context("Invalid value for strict_ack. Use 'true' or 'false'.")?;
        }
        "probe_interval_secs" => {
            config.probe_interval_secs = value
                .parse()
                .context("Invalid value for probe_interval_secs. Use a number of seconds.")?;
        }
        "app_name" => config.app_name = value.to_string(),
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}
