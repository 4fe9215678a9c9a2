//! Outcome of a synchronization pass

use serde::Serialize;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Whether the pass reconciled the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    Failure,
}

/// Why a pass failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFailure {
    /// The local queue could not be read
    Storage,
    /// No response reached us; the queue was left untouched
    Transport,
    /// The remote authority rejected our credentials
    CredentialRejected,
    /// The remote authority answered with an error
    Server,
    /// Per-record acknowledgement was required but not provided
    Unacknowledged,
}

/// Result of `SyncCoordinator::synchronize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub outcome: SyncOutcome,
    pub synced_count: u64,
    pub failed_count: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SyncFailure>,
}

impl SyncResult {
    /// Nothing was pending; no request was made
    pub fn nothing_to_sync() -> Self {
        Self {
            outcome: SyncOutcome::Success,
            synced_count: 0,
            failed_count: 0,
            message: "No events to synchronize".to_string(),
            failure: None,
        }
    }

    pub fn success(synced_count: u64, failed_count: u64) -> Self {
        Self {
            outcome: SyncOutcome::Success,
            synced_count,
            failed_count,
            message: format!("{synced_count} event(s) synchronized"),
            failure: None,
        }
    }

    pub fn failure(kind: SyncFailure, message: impl Into<String>) -> Self {
        Self {
            outcome: SyncOutcome::Failure,
            synced_count: 0,
            failed_count: 0,
            message: message.into(),
            failure: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Success
    }

    /// Whether views showing event history should reload
    pub fn should_refresh(&self) -> bool {
        self.is_success() && self.synced_count > 0
    }
}

impl From<RemoteError> for SyncResult {
    fn from(error: RemoteError) -> Self {
        let kind = match &error {
            RemoteError::Transport(_) => SyncFailure::Transport,
            RemoteError::CredentialRejected => SyncFailure::CredentialRejected,
            RemoteError::Server { .. } | RemoteError::Decode(_) => SyncFailure::Server,
        };
        Self::failure(kind, error.to_string())
    }
}

impl From<StorageError> for SyncResult {
    fn from(error: StorageError) -> Self {
        Self::failure(SyncFailure::Storage, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_refresh_only_after_delivery() {
        assert!(SyncResult::success(2, 0).should_refresh());
        assert!(!SyncResult::success(0, 1).should_refresh());
        assert!(!SyncResult::nothing_to_sync().should_refresh());
        assert!(!SyncResult::failure(SyncFailure::Transport, "offline").should_refresh());
    }

    #[test]
    fn test_remote_error_classification() {
        let result = SyncResult::from(RemoteError::CredentialRejected);
        assert_eq!(result.outcome, SyncOutcome::Failure);
        assert_eq!(result.failure, Some(SyncFailure::CredentialRejected));

        let result = SyncResult::from(RemoteError::Server {
            status: 500,
            message: "boom".to_string(),
        });
        assert_eq!(result.failure, Some(SyncFailure::Server));
        assert!(result.message.contains("boom"));
    }

    #[test]
    fn test_serializes_for_output() {
        let json = serde_json::to_value(SyncResult::success(3, 0)).unwrap();
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["synced_count"], 3);
        assert!(json.get("failure").is_none());
    }
}
