//! Connectivity observer
//!
//! Tracks whether the network is reachable. State changes only through
//! `signal`, which the platform adapter calls with reachability reports;
//! the observer itself never probes. On every offline → online transition
//! it runs the sync coordinator once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::Config;
use crate::notify::{Notification, Notifier};
use crate::sync::{SyncCoordinator, SyncResult};

/// Handle returned by `subscribe`, used to unsubscribe
pub type SubscriptionId = u64;

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

/// Process-wide online/offline state
pub struct ConnectivityObserver {
    state: watch::Sender<bool>,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
    coordinator: Arc<SyncCoordinator>,
    notifier: Arc<dyn Notifier>,
    app_name: String,
}

impl ConnectivityObserver {
    pub fn new(
        initially_online: bool,
        coordinator: Arc<SyncCoordinator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            state,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            coordinator,
            notifier,
            app_name: "Ponto".to_string(),
        }
    }

    /// Title used for the "events synchronized" notification
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Last known state; never probes the network
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Register a callback invoked synchronously on every transition
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Report a reachability signal from the platform
    ///
    /// A signal matching the current state is ignored. On a transition,
    /// subscribers are told first; then, if the network came back, the
    /// coordinator runs once and its result is returned.
    pub async fn signal(&self, online: bool) -> Option<SyncResult> {
        let previous = self.state.send_replace(online);
        if previous == online {
            debug!(online, "Connectivity unchanged");
            return None;
        }

        info!(online, "Connectivity changed");
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(online);
        }

        if !online {
            return None;
        }

        let result = self.coordinator.synchronize().await;
        if result.is_success() && result.synced_count > 0 {
            self.notifier
                .show(&Notification::new(&self.app_name, &result.message));
        }
        Some(result)
    }
}

/// Platform adapter that turns periodic TCP reachability checks into signals
pub struct Reachability {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Reachability {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Probe the host and port of the configured remote authority
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let url = Url::parse(&config.api_url)
            .map_err(|e| anyhow::anyhow!("Invalid api_url '{}': {}", config.api_url, e))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("api_url '{}' has no host", config.api_url))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("api_url '{}' has no port", config.api_url))?;
        Ok(Self::new(host, port, config.request_timeout()))
    }

    /// Whether a TCP connection can be opened right now
    pub async fn probe(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(host = %self.host, port = self.port, error = %e, "Host unreachable");
                false
            }
            Err(_) => {
                debug!(host = %self.host, port = self.port, "Reachability probe timed out");
                false
            }
        }
    }

    /// Feed probe results into `observer` until `shutdown` flips to true
    ///
    /// Each sync result produced by a transition is passed to `on_sync`.
    pub async fn run<F>(
        &self,
        observer: &ConnectivityObserver,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
        mut on_sync: F,
    ) where
        F: FnMut(SyncResult),
    {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let online = self.probe().await;
                    if let Some(result) = observer.signal(online).await {
                        on_sync(result);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Reachability monitor stopped");
    }
}
