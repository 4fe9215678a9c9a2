//! Producer boundary for clock events
//!
//! When the network is believed reachable and nothing is waiting in the
//! local queue, events go straight to the remote authority. Otherwise they
//! are appended to the queue; if the device is online the whole queue is
//! then sent oldest first so a newer event never overtakes an older one.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::ClockEvent;
use crate::remote::{RemoteAuthority, RemoteError, WireRecord};
use crate::storage::{LocalQueue, StorageError};
use crate::sync::{AckPolicy, SyncCoordinator, SyncFailure};

/// Where a recorded event ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Accepted by the remote authority
    Sent,
    /// Sent together with older queued events in one batch
    Synced { synced_count: u64, failed_count: u64 },
    /// Saved locally with the given queue id
    Queued(i64),
}

/// Errors surfaced to the producer
#[derive(Error, Debug)]
pub enum RecordError {
    /// The authority answered and refused the event (including credential rejection)
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The event could not be saved offline
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Records clock events online or into the queue
pub struct ClockRecorder {
    queue: Arc<LocalQueue>,
    remote: Arc<dyn RemoteAuthority>,
    coordinator: SyncCoordinator,
}

impl ClockRecorder {
    pub fn new(queue: Arc<LocalQueue>, remote: Arc<dyn RemoteAuthority>) -> Self {
        let coordinator = SyncCoordinator::new(queue.clone(), remote.clone());
        Self {
            queue,
            remote,
            coordinator,
        }
    }

    /// Acknowledgement policy used when the backlog is flushed
    pub fn with_policy(mut self, policy: AckPolicy) -> Self {
        self.coordinator = self.coordinator.with_policy(policy);
        self
    }

    /// Record `event`, sending it directly when `online`
    pub async fn record(&self, event: &ClockEvent, online: bool) -> Result<RecordOutcome, RecordError> {
        if online {
            if self.has_backlog().await {
                return self.record_behind_backlog(event).await;
            }
            match self.remote.register(&WireRecord::from(event)).await {
                Ok(()) => {
                    info!(clock_type = %event.clock_type, "Event registered");
                    return Ok(RecordOutcome::Sent);
                }
                Err(RemoteError::Transport(reason)) => {
                    warn!(%reason, "Direct registration did not reach the server; queueing");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let id = self.queue.append(event).await?;
        info!(id, clock_type = %event.clock_type, "Event saved offline");
        Ok(RecordOutcome::Queued(id))
    }

    async fn has_backlog(&self) -> bool {
        match self.queue.pending_count().await {
            Ok(count) => count > 0,
            Err(e) => {
                // Nothing can be queued either; a direct send is the only option
                warn!(error = %e, "Cannot read the local queue");
                false
            }
        }
    }

    /// Queue `event` after the pending ones and send them all in order
    async fn record_behind_backlog(&self, event: &ClockEvent) -> Result<RecordOutcome, RecordError> {
        let id = self.queue.append(event).await?;
        info!(id, clock_type = %event.clock_type, "Older events pending; sending in queue order");

        let result = self.coordinator.synchronize().await;
        if result.is_success() {
            return Ok(RecordOutcome::Synced {
                synced_count: result.synced_count,
                failed_count: result.failed_count,
            });
        }
        if result.failure == Some(SyncFailure::CredentialRejected) {
            return Err(RemoteError::CredentialRejected.into());
        }
        warn!(id, reason = %result.message, "Queue not sent; event stays saved offline");
        Ok(RecordOutcome::Queued(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClockType;
    use crate::remote::SyncResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Remote with a canned direct-registration reply; batches are accepted
    /// unless `batch_error` is set
    struct RegisterOnly {
        reply: Mutex<Option<Result<(), RemoteError>>>,
        batch_error: Mutex<Option<RemoteError>>,
        registered: Mutex<Vec<WireRecord>>,
        batches: Mutex<Vec<Vec<WireRecord>>>,
    }

    impl RegisterOnly {
        fn replying(reply: Result<(), RemoteError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                batch_error: Mutex::new(None),
                registered: Mutex::new(Vec::new()),
                batches: Mutex::new(Vec::new()),
            })
        }

        fn failing_batches(error: RemoteError) -> Arc<Self> {
            let remote = Self::replying(Ok(()));
            *remote.batch_error.lock().unwrap() = Some(error);
            remote
        }
    }

    #[async_trait]
    impl RemoteAuthority for RegisterOnly {
        async fn sync_batch(&self, records: &[WireRecord]) -> Result<SyncResponse, RemoteError> {
            if let Some(error) = self.batch_error.lock().unwrap().take() {
                return Err(error);
            }
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(SyncResponse {
                synced_count: records.len() as u64,
                ..SyncResponse::default()
            })
        }

        async fn register(&self, record: &WireRecord) -> Result<(), RemoteError> {
            self.registered.lock().unwrap().push(record.clone());
            self.reply.lock().unwrap().take().unwrap_or(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_online_sends_directly() {
        let queue = Arc::new(LocalQueue::in_memory());
        let remote = RegisterOnly::replying(Ok(()));
        let recorder = ClockRecorder::new(queue.clone(), remote.clone());

        let outcome = recorder
            .record(&ClockEvent::new(ClockType::ClockIn), true)
            .await
            .unwrap();

        assert_eq!(outcome, RecordOutcome::Sent);
        assert_eq!(remote.registered.lock().unwrap().len(), 1);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_queues_without_network() {
        let queue = Arc::new(LocalQueue::in_memory());
        let remote = RegisterOnly::replying(Ok(()));
        let recorder = ClockRecorder::new(queue.clone(), remote.clone());

        let outcome = recorder
            .record(&ClockEvent::new(ClockType::BreakStart), false)
            .await
            .unwrap();

        assert!(matches!(outcome, RecordOutcome::Queued(_)));
        assert!(remote.registered.lock().unwrap().is_empty());
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_queue() {
        let queue = Arc::new(LocalQueue::in_memory());
        let remote = RegisterOnly::replying(Err(RemoteError::Transport("timed out".into())));
        let recorder = ClockRecorder::new(queue.clone(), remote);

        let outcome = recorder
            .record(&ClockEvent::new(ClockType::ClockOut), true)
            .await
            .unwrap();

        assert!(matches!(outcome, RecordOutcome::Queued(_)));
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_credential_rejection_is_surfaced_not_queued() {
        let queue = Arc::new(LocalQueue::in_memory());
        let remote = RegisterOnly::replying(Err(RemoteError::CredentialRejected));
        let recorder = ClockRecorder::new(queue.clone(), remote);

        let err = recorder
            .record(&ClockEvent::new(ClockType::ClockIn), true)
            .await
            .unwrap_err();

        assert!(matches!(err, RecordError::Remote(RemoteError::CredentialRejected)));
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_server_rejection_is_surfaced() {
        let queue = Arc::new(LocalQueue::in_memory());
        let remote = RegisterOnly::replying(Err(RemoteError::Server {
            status: 400,
            message: "Already clocked in".into(),
        }));
        let recorder = ClockRecorder::new(queue.clone(), remote);

        let err = recorder
            .record(&ClockEvent::new(ClockType::ClockIn), true)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Already clocked in"));
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_online_event_waits_behind_queued_events() {
        let queue = Arc::new(LocalQueue::in_memory());
        let remote = RegisterOnly::replying(Ok(()));
        let recorder = ClockRecorder::new(queue.clone(), remote.clone());

        recorder
            .record(&ClockEvent::new(ClockType::ClockIn), false)
            .await
            .unwrap();
        let outcome = recorder
            .record(&ClockEvent::new(ClockType::BreakStart), true)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RecordOutcome::Synced {
                synced_count: 2,
                failed_count: 0
            }
        );
        assert!(remote.registered.lock().unwrap().is_empty());
        let batches = remote.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        let types: Vec<ClockType> = batches[0].iter().map(|r| r.clock_type).collect();
        assert_eq!(types, vec![ClockType::ClockIn, ClockType::BreakStart]);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsent_backlog_keeps_new_event_queued_in_order() {
        let queue = Arc::new(LocalQueue::in_memory());
        let remote = RegisterOnly::failing_batches(RemoteError::Transport("timed out".into()));
        let recorder = ClockRecorder::new(queue.clone(), remote.clone());

        recorder
            .record(&ClockEvent::new(ClockType::ClockIn), false)
            .await
            .unwrap();
        let outcome = recorder
            .record(&ClockEvent::new(ClockType::BreakStart), true)
            .await
            .unwrap();

        assert!(matches!(outcome, RecordOutcome::Queued(_)));
        assert!(remote.registered.lock().unwrap().is_empty());
        let types: Vec<ClockType> = queue
            .list_pending()
            .await
            .unwrap()
            .iter()
            .map(|e| e.clock_type)
            .collect();
        assert_eq!(types, vec![ClockType::ClockIn, ClockType::BreakStart]);
    }

    #[tokio::test]
    async fn test_backlog_credential_rejection_is_surfaced() {
        let queue = Arc::new(LocalQueue::in_memory());
        let remote = RegisterOnly::failing_batches(RemoteError::CredentialRejected);
        let recorder = ClockRecorder::new(queue.clone(), remote);

        recorder
            .record(&ClockEvent::new(ClockType::ClockIn), false)
            .await
            .unwrap();
        let err = recorder
            .record(&ClockEvent::new(ClockType::ClockOut), true)
            .await
            .unwrap_err();

        assert!(matches!(err, RecordError::Remote(RemoteError::CredentialRejected)));
        // Both events are kept for the next sync
        assert_eq!(queue.pending_count().await.unwrap(), 2);
    }
}
