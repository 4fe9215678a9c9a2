//! Remote authority client
//!
//! The remote authority is the backend service that durably records clock
//! events. This module defines:
//!
//! - The wire shapes exchanged with it (`WireRecord`, `SyncRequest`, `SyncResponse`)
//! - The `RemoteAuthority` seam used by the sync coordinator and the recorder
//! - `HttpRemoteAuthority`, the reqwest implementation
//! - `Credentials`, the stored bearer token cleared on credential rejection

mod credentials;
mod http;

pub use credentials::Credentials;
pub use http::HttpRemoteAuthority;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ClockEvent, ClockType, PendingEvent};

/// Endpoint receiving a batch of queued events
pub const SYNC_ENDPOINT: &str = "/ponto/sincronizar";

/// Endpoint receiving a single live event
pub const REGISTER_ENDPOINT: &str = "/ponto/registrar";

/// One event as transmitted to the remote authority
///
/// Local-only fields (`id`, `created_at`, `sync_status`) are never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub clock_type: ClockType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub photo_base64: Option<String>,
}

impl From<&ClockEvent> for WireRecord {
    fn from(event: &ClockEvent) -> Self {
        Self {
            clock_type: event.clock_type,
            latitude: event.coordinates.map(|c| c.latitude),
            longitude: event.coordinates.map(|c| c.longitude),
            photo_base64: event.photo.as_ref().map(|p| p.as_str().to_string()),
        }
    }
}

impl From<&PendingEvent> for WireRecord {
    fn from(event: &PendingEvent) -> Self {
        Self::from(&event.event())
    }
}

/// Body of a batch sync request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub records: Vec<WireRecord>,
}

/// Aggregate result reported by the remote authority for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    #[serde(alias = "quantidade_sincronizada")]
    pub synced_count: u64,
    #[serde(alias = "quantidade_falhas")]
    pub failed_count: u64,
    #[serde(default, alias = "erros")]
    pub errors: Vec<String>,
    /// Indices into the transmitted batch that were accepted, when the
    /// authority reports per-record acknowledgement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<Vec<usize>>,
}

/// Errors from talking to the remote authority
#[derive(Error, Debug)]
pub enum RemoteError {
    /// No response reached us (offline, refused, timed out)
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The authority rejected the stored credentials (HTTP 401)
    #[error("Session expired. Sign in again")]
    CredentialRejected,

    /// The authority answered with a non-success status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body could not be decoded
    #[error("Invalid response from server: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether the request never reached the authority
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

/// The backend that durably records clock events
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Send a batch of queued events in order, in one request
    async fn sync_batch(&self, records: &[WireRecord]) -> Result<SyncResponse, RemoteError>;

    /// Send a single live event
    async fn register(&self, record: &WireRecord) -> Result<(), RemoteError>;
}

/// Extract a human-readable message from an error response body
///
/// Prefers `detail` (stringified when it is not a string), then `message`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(detail) = value.get("detail") {
        return Some(match detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}
