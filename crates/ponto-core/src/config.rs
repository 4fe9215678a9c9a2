//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/ponto/config.toml)
//! 3. Environment variables (PONTO_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "PONTO";

/// Assets primed into the static cache generation at install time
pub const DEFAULT_STATIC_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/css/main.css",
    "/css/ponto.css",
    "/js/config.js",
    "/js/api.js",
    "/js/auth.js",
    "/js/camera.js",
    "/js/geolocation.js",
    "/js/offline.js",
    "/js/ponto.js",
    "/js/ui.js",
    "/js/app.js",
    "/manifest.json",
];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (queue, cache and credentials)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the remote authority
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Path fragment identifying remote-API requests
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Origin serving the application's static assets
    #[serde(default = "default_app_origin")]
    pub app_origin: String,

    /// Naming scheme shared by every cache generation of this application
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Current cache generation version
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Paths primed into the static generation at install time
    #[serde(default = "default_static_manifest")]
    pub static_manifest: Vec<String>,

    /// Page served (with status 503) when a cache-first request cannot be satisfied
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Transport timeout for remote calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Only purge records the remote authority acknowledges individually
    #[serde(default)]
    pub strict_ack: bool,

    /// Interval of the reachability probe used by `ponto watch`
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Default title for notifications
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Log file path (defaults to stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_url: default_api_url(),
            api_prefix: default_api_prefix(),
            app_origin: default_app_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            static_manifest: default_static_manifest(),
            offline_page: default_offline_page(),
            request_timeout_secs: default_request_timeout_secs(),
            strict_ack: false,
            probe_interval_secs: default_probe_interval_secs(),
            app_name: default_app_name(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (PONTO_DATA_DIR, PONTO_API_URL, ...)
    /// 2. Config file (~/.config/ponto/config.toml or PONTO_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.api_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_CACHE_VERSION", ENV_PREFIX)) {
            if !val.is_empty() {
                self.cache_version = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_STRICT_ACK", ENV_PREFIX)) {
            self.strict_ack = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Ensure data directory exists
    ///
    /// Failure here is not fatal: the queue reports storage as unavailable
    /// when it is first opened and the client degrades to online-only mode.
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.data_dir) {
                tracing::warn!(
                    "Failed to create data directory {:?}: {}",
                    self.data_dir,
                    e
                );
            }
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with PONTO_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ponto")
            .join("config.toml")
    }

    /// Get the path to the pending-event queue database
    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join("queue.db")
    }

    /// Get the path to the proxy cache database
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache.db")
    }

    /// Get the path to the stored credentials
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials")
    }

    /// Transport timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Reachability probe interval as a `Duration`
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ponto")
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_prefix() -> String {
    "/api/".to_string()
}

fn default_app_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_cache_prefix() -> String {
    "ponto".to_string()
}

fn default_cache_version() -> String {
    "v1".to_string()
}

fn default_static_manifest() -> Vec<String> {
    DEFAULT_STATIC_MANIFEST.iter().map(|s| s.to_string()).collect()
}

fn default_offline_page() -> String {
    "/offline.html".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_probe_interval_secs() -> u64 {
    15
}

fn default_app_name() -> String {
    "Ponto".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "PONTO_DATA_DIR",
        "PONTO_API_URL",
        "PONTO_CACHE_VERSION",
        "PONTO_STRICT_ACK",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.strict_ack);
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.cache_version, "v1");
        assert!(config.static_manifest.contains(&"/index.html".to_string()));
        assert!(config.data_dir.ends_with("ponto"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();

        assert!(config.queue_path().ends_with("queue.db"));
        assert!(config.cache_path().ends_with("cache.db"));
        assert!(config.credentials_path().ends_with("credentials"));
    }

    #[test]
    fn test_durations_never_zero() {
        let config = Config {
            request_timeout_secs: 0,
            probe_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        assert_eq!(config.probe_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("PONTO_DATA_DIR", "/tmp/ponto-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/ponto-test"));
    }

    #[test]
    fn test_env_override_strict_ack() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        assert!(!config.strict_ack);

        env::set_var("PONTO_STRICT_ACK", "true");
        config.apply_env_overrides();
        assert!(config.strict_ack);

        env::set_var("PONTO_STRICT_ACK", "0");
        config.apply_env_overrides();
        assert!(!config.strict_ack);
    }

    #[test]
    fn test_env_override_api_url_ignores_empty() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("PONTO_API_URL", "https://ponto.example.com");
        config.apply_env_overrides();
        assert_eq!(config.api_url, "https://ponto.example.com");

        env::set_var("PONTO_API_URL", "");
        config.apply_env_overrides();
        assert_eq!(config.api_url, "https://ponto.example.com");
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/ponto"),
            api_url: "https://api.example.com".to_string(),
            cache_version: "v7".to_string(),
            strict_ack: true,
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("cache_version"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            api_url = "https://api.example.com"
            cache_version = "v2"
            static_manifest = ["/", "/app.js"]
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.cache_version, "v2");
        assert_eq!(config.static_manifest, vec!["/", "/app.js"]);
        assert_eq!(config.api_prefix, "/api/");
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("PONTO_DATA_DIR", temp_dir.path());

        let config = Config::load_from_path(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(!config.strict_ack);
        assert_eq!(config.data_dir, temp_dir.path());
    }

    #[test]
    fn test_save_to_path_round_trip() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().join("data"),
            app_name: "Clock".to_string(),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
