//! Caching proxy
//!
//! A long-lived request interceptor that serves the application's static
//! assets and decides per request whether to prefer cache or network.
//!
//! ## Lifecycle
//!
//! 1. **Install**: fetch every manifest asset and store it in the current
//!    static generation. All-or-nothing.
//! 2. **Activate**: delete stale generations of this application, then
//!    start controlling requests.
//! 3. **Intercept**: route each request to cache-first or network-first.
//!
//! State lives in the cache database, so it survives restarts.

mod background;
mod generation;
mod network;
mod route;

pub use background::{BackgroundSync, DispatchOutcome, MAX_ATTEMPTS, RETRY_DELAYS, SYNC_TAG};
pub use generation::{CacheGeneration, GenerationKind, GenerationSet};
pub use network::{Destination, FetchError, HttpNetwork, Network, ProxyRequest, ProxyResponse};
pub use route::{Route, Router, Strategy};

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::notify::{LogNotifier, Notification, Notifier};
use crate::storage::{CacheStorage, StorageError};
use crate::sync::{SyncCoordinator, SyncResult};

/// Status of synthesized offline responses
pub const OFFLINE_STATUS: u16 = 503;

/// Message carried by the network-first offline payload
pub const OFFLINE_MESSAGE: &str = "You are offline and this content is not available in the cache";

const ACTIVE_VERSION_KEY: &str = "active_version";

/// Errors from proxy lifecycle hooks
#[derive(Error, Debug)]
pub enum ProxyError {
    /// A manifest asset could not be primed; nothing was stored
    #[error("Install failed: could not cache '{path}': {reason}")]
    InstallFailed { path: String, reason: String },

    /// Activation requested before the current version was installed
    #[error("Version '{version}' is not installed")]
    NotInstalled { version: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A background sync attempt failed and should be redelivered
    #[error("Background sync failed: {0}")]
    SyncFailed(String),
}

/// Where the proxy is in its lifecycle for the current version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Current version not installed yet
    New,
    /// Static generation primed, waiting for activation
    Installed,
    /// Controlling requests
    Active,
}

impl ProxyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyState::New => "new",
            ProxyState::Installed => "installed",
            ProxyState::Active => "active",
        }
    }
}

/// Result of `activate`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Stale generations that were deleted
    pub deleted: Vec<String>,
}

/// Request interceptor backed by persisted cache generations
pub struct CachingProxy {
    cache: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    router: Router,
    generations: GenerationSet,
    manifest: Vec<String>,
    app_origin: String,
    offline_page: String,
    app_name: String,
    coordinator: Option<Arc<SyncCoordinator>>,
    notifier: Arc<dyn Notifier>,
}

impl CachingProxy {
    pub fn new(config: &Config, cache: Arc<CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            cache,
            network,
            router: Router::from_config(config),
            generations: GenerationSet::new(&config.cache_prefix, &config.cache_version),
            manifest: config.static_manifest.clone(),
            app_origin: config.app_origin.trim_end_matches('/').to_string(),
            offline_page: config.offline_page.clone(),
            app_name: config.app_name.clone(),
            coordinator: None,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Delegate background sync signals to `coordinator`
    pub fn with_coordinator(mut self, coordinator: Arc<SyncCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn generations(&self) -> &GenerationSet {
        &self.generations
    }

    pub fn cache(&self) -> &Arc<CacheStorage> {
        &self.cache
    }

    /// Absolute URL of an application path
    pub fn asset_url(&self, path: &str) -> String {
        format!("{}{}", self.app_origin, path)
    }

    /// Lifecycle state for the current version
    pub async fn state(&self) -> Result<ProxyState, ProxyError> {
        let active = self.cache.get_meta(ACTIVE_VERSION_KEY).await?;
        if active.as_deref() == Some(self.generations.version()) {
            return Ok(ProxyState::Active);
        }
        if self.cache.has_generation(&self.generations.static_name()).await? {
            return Ok(ProxyState::Installed);
        }
        Ok(ProxyState::New)
    }

    /// Whether requests are being intercepted
    pub async fn is_controlling(&self) -> bool {
        matches!(self.state().await, Ok(ProxyState::Active))
    }

    /// Prime the static generation with every manifest asset
    ///
    /// Assets are fetched concurrently and stored only once all arrive. A
    /// single failure or non-success response aborts the install and leaves
    /// the cache as it was.
    pub async fn install(&self) -> Result<usize, ProxyError> {
        let generation = self.generations.static_name();
        info!(generation = %generation, assets = self.manifest.len(), "Installing");

        let fetches = self.manifest.iter().map(|path| async move {
            let request = ProxyRequest::get(self.asset_url(path));
            let response = self.network.fetch(&request).await.map_err(|e| {
                ProxyError::InstallFailed {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;
            if !response.is_success() {
                return Err(ProxyError::InstallFailed {
                    path: path.clone(),
                    reason: format!("server responded with status {}", response.status),
                });
            }
            Ok::<_, ProxyError>((request.cache_key(), response))
        });
        let entries = try_join_all(fetches).await?;

        self.cache.put_all(&generation, &entries).await?;
        info!(generation = %generation, "Install complete");
        Ok(entries.len())
    }

    /// Delete stale generations and start controlling requests
    pub async fn activate(&self) -> Result<ActivationReport, ProxyError> {
        if !self
            .cache
            .has_generation(&self.generations.static_name())
            .await?
        {
            return Err(ProxyError::NotInstalled {
                version: self.generations.version().to_string(),
            });
        }

        let names = self.cache.generations().await?;
        let mut report = ActivationReport::default();
        for name in self.generations.stale(&names) {
            info!(generation = name, "Deleting stale generation");
            if self.cache.delete_generation(name).await? {
                report.deleted.push(name.to_string());
            }
        }

        self.cache
            .set_meta(ACTIVE_VERSION_KEY, self.generations.version())
            .await?;
        info!(version = self.generations.version(), "Proxy active");
        Ok(report)
    }

    /// Serve one outbound request
    ///
    /// Intercepted requests always produce a response; only requests the
    /// proxy does not intercept (non-HTTP, or before activation) can fail.
    pub async fn handle(&self, request: &ProxyRequest) -> Result<ProxyResponse, FetchError> {
        let route = self.router.classify(request);
        let controlling = self.is_controlling().await;
        debug!(url = %request.url, route = route.as_str(), controlling, "Request");

        if !controlling {
            return self.network.fetch(request).await;
        }

        match route.strategy() {
            Strategy::Passthrough => self.network.fetch(request).await,
            Strategy::CacheFirst => Ok(self.cache_first(request).await),
            Strategy::NetworkFirst => Ok(self.network_first(request).await),
        }
    }

    async fn cache_first(&self, request: &ProxyRequest) -> ProxyResponse {
        if let Some(cached) = self.lookup(request).await {
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_dynamic(request, &response).await;
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Fetch failed with nothing cached");
                self.offline_fallback().await
            }
        }
    }

    async fn network_first(&self, request: &ProxyRequest) -> ProxyResponse {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_dynamic(request, &response).await;
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network unavailable, trying cache");
                if let Some(cached) = self.lookup(request).await {
                    return cached;
                }
                ProxyResponse::json(
                    OFFLINE_STATUS,
                    &json!({"error": "Offline", "message": OFFLINE_MESSAGE}),
                )
            }
        }
    }

    /// Cached response for a GET request, searching current generations first
    async fn lookup(&self, request: &ProxyRequest) -> Option<ProxyResponse> {
        if !request.is_get() {
            return None;
        }
        match self
            .cache
            .match_any(&request.cache_key(), &self.generations.current_names())
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    /// Copy a successful GET response into the dynamic generation
    async fn store_dynamic(&self, request: &ProxyRequest, response: &ProxyResponse) {
        if !request.is_get() || !response.is_success() {
            return;
        }
        let generation = self.generations.dynamic_name();
        if let Err(e) = self
            .cache
            .put(&generation, &request.cache_key(), response)
            .await
        {
            warn!(url = %request.url, error = %e, "Failed to cache response");
        }
    }

    /// The designated offline page with status 503, or a plain-text stand-in
    async fn offline_fallback(&self) -> ProxyResponse {
        let page = ProxyRequest::get(self.asset_url(&self.offline_page));
        match self.lookup(&page).await {
            Some(mut cached) => {
                cached.status = OFFLINE_STATUS;
                cached
            }
            None => ProxyResponse::new(OFFLINE_STATUS, "Offline")
                .with_header("Content-Type", "text/plain"),
        }
    }

    /// Handle a deferred background sync signal
    ///
    /// Returns `None` for tags this proxy does not handle. A failed sync, or
    /// a proxy with no coordinator to run one, is returned as
    /// `ProxyError::SyncFailed` so the signal is redelivered.
    pub async fn on_sync(&self, tag: &str) -> Result<Option<SyncResult>, ProxyError> {
        if tag != SYNC_TAG {
            debug!(tag, "Ignoring unknown background sync tag");
            return Ok(None);
        }
        let coordinator = match &self.coordinator {
            Some(coordinator) => coordinator,
            None => {
                warn!(tag, "Background sync received without a coordinator");
                return Err(ProxyError::SyncFailed(
                    "no sync coordinator configured".to_string(),
                ));
            }
        };

        let result = coordinator.synchronize().await;
        if !result.is_success() {
            return Err(ProxyError::SyncFailed(result.message));
        }
        Ok(Some(result))
    }

    /// Surface a push payload as a notification
    pub fn on_push(&self, payload: Option<&serde_json::Value>) -> Notification {
        let notification = Notification::from_push(payload, &self.app_name);
        self.notifier.show(&notification);
        notification
    }

    /// Bring the application root to the foreground
    pub fn on_notification_click(&self, notification: &Notification) {
        debug!(title = %notification.title, "Notification clicked");
        self.notifier.focus("/");
    }
}
