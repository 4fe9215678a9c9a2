//! Ponto Core Library
//!
//! This crate provides the offline-first synchronization subsystem of
//! Ponto, a time-clock client that keeps recording clock events while the
//! network is unreliable.
//!
//! # Architecture
//!
//! - **Local queue**: SQLite store of pending events, the only shared
//!   mutable state
//! - **Sync coordinator**: drains the queue against the remote authority
//! - **Connectivity observer**: triggers a sync on every reconnect
//! - **Caching proxy**: serves static assets and API responses from
//!   versioned cache generations when the network is unavailable
//!
//! # Quick Start
//!
//! ```text
//! let queue = Arc::new(LocalQueue::from_config(&config));
//! let remote = Arc::new(HttpRemoteAuthority::from_config(&config, credentials)?);
//!
//! // Record while offline
//! queue.append(&ClockEvent::new(ClockType::ClockIn)).await?;
//!
//! // Later, reconcile
//! let result = SyncCoordinator::new(queue, remote).synchronize().await;
//! ```
//!
//! # Modules
//!
//! - `models`: Clock events and queued records
//! - `storage`: Local queue and cache generation stores
//! - `remote`: Remote authority client and credentials
//! - `sync`: Sync coordinator and results
//! - `connectivity`: Online/offline observer and reachability probe
//! - `recorder`: Online-or-queue producer boundary
//! - `proxy`: Caching proxy and background sync scheduling
//! - `notify`: User notifications
//! - `config`: Application configuration

pub mod config;
pub mod connectivity;
pub mod models;
pub mod notify;
pub mod proxy;
pub mod recorder;
pub mod remote;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use connectivity::{ConnectivityObserver, Reachability};
pub use models::{ClockEvent, ClockType, Coordinates, PendingEvent, PhotoPayload, SyncStatus};
pub use notify::{LogNotifier, Notification, Notifier};
pub use proxy::{CachingProxy, ProxyError, ProxyRequest, ProxyResponse};
pub use recorder::{ClockRecorder, RecordError, RecordOutcome};
pub use remote::{Credentials, HttpRemoteAuthority, RemoteAuthority, RemoteError};
pub use storage::{CacheStorage, LocalQueue, StorageError};
pub use sync::{AckPolicy, SyncCoordinator, SyncFailure, SyncOutcome, SyncResult};
