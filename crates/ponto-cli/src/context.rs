//! Wiring of core components from configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use ponto_core::proxy::HttpNetwork;
use ponto_core::{
    AckPolicy, CacheStorage, CachingProxy, ClockRecorder, Config, Credentials,
    HttpRemoteAuthority, LocalQueue, Notifier, Reachability, SyncCoordinator,
};

/// Components shared by every command
pub struct Context {
    pub config: Config,
    pub queue: Arc<LocalQueue>,
    pub credentials: Arc<Credentials>,
}

impl Context {
    /// Load configuration and open the local queue
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let config =
            Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        let queue = Arc::new(LocalQueue::from_config(&config));
        let credentials = Arc::new(Credentials::new(config.credentials_path()));
        Self {
            config,
            queue,
            credentials,
        }
    }

    pub fn remote(&self) -> Result<Arc<HttpRemoteAuthority>> {
        let remote = HttpRemoteAuthority::from_config(&self.config, self.credentials.clone())
            .context("Failed to create API client")?;
        Ok(Arc::new(remote))
    }

    pub fn coordinator(&self) -> Result<Arc<SyncCoordinator>> {
        let coordinator = SyncCoordinator::new(self.queue.clone(), self.remote()?)
            .with_policy(AckPolicy::from_config(&self.config));
        Ok(Arc::new(coordinator))
    }

    pub fn recorder(&self) -> Result<ClockRecorder> {
        Ok(ClockRecorder::new(self.queue.clone(), self.remote()?)
            .with_policy(AckPolicy::from_config(&self.config)))
    }

    pub fn reachability(&self) -> Result<Reachability> {
        Reachability::from_config(&self.config)
    }

    /// Open the cache and build a proxy that syncs through the coordinator
    pub fn proxy(&self, notifier: Arc<dyn Notifier>) -> Result<CachingProxy> {
        let cache = CacheStorage::open(self.config.cache_path()).with_context(|| {
            format!(
                "Failed to open cache at {}",
                self.config.cache_path().display()
            )
        })?;
        let network =
            HttpNetwork::new(self.config.request_timeout()).context("Failed to create HTTP client")?;

        Ok(
            CachingProxy::new(&self.config, Arc::new(cache), Arc::new(network))
                .with_coordinator(self.coordinator()?)
                .with_notifier(notifier),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_uses_configured_paths() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        let ctx = Context::from_config(config);

        assert_eq!(ctx.queue.path(), Some(temp_dir.path().join("queue.db").as_path()));
        assert!(!ctx.credentials.is_authenticated());
        assert!(ctx.coordinator().is_ok());
    }
}
