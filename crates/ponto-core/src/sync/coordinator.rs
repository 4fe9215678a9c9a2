//! Synchronization coordinator
//!
//! Drains the local queue against the remote authority in one batch.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::result::{SyncFailure, SyncResult};
use crate::config::Config;
use crate::models::PendingEvent;
use crate::remote::{RemoteAuthority, SyncResponse, WireRecord};
use crate::storage::LocalQueue;

/// How a batch response decides which records are confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Every transmitted record is confirmed once any response arrives,
    /// even when the authority reports failures for part of the batch
    #[default]
    TrustBatch,
    /// Only records whose batch index the authority lists in `accepted`
    /// are confirmed; the rest stay pending for the next pass
    PerRecord,
}

impl AckPolicy {
    pub fn from_config(config: &Config) -> Self {
        if config.strict_ack {
            AckPolicy::PerRecord
        } else {
            AckPolicy::TrustBatch
        }
    }
}

/// Reconciles the local queue with the remote authority
///
/// Overlapping calls to `synchronize` are allowed. The same batch may then
/// be transmitted twice; marking and purging are idempotent so the queue
/// still ends up consistent.
pub struct SyncCoordinator {
    queue: Arc<LocalQueue>,
    remote: Arc<dyn RemoteAuthority>,
    policy: AckPolicy,
}

impl SyncCoordinator {
    pub fn new(queue: Arc<LocalQueue>, remote: Arc<dyn RemoteAuthority>) -> Self {
        Self {
            queue,
            remote,
            policy: AckPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AckPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> AckPolicy {
        self.policy
    }

    pub fn queue(&self) -> &Arc<LocalQueue> {
        &self.queue
    }

    /// Send every pending event, oldest first, and confirm what was accepted
    ///
    /// Never fails: every error is reported through the returned `SyncResult`.
    pub async fn synchronize(&self) -> SyncResult {
        let pending = match self.queue.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Cannot read pending events");
                return SyncResult::from(e);
            }
        };

        if pending.is_empty() {
            debug!("Nothing to synchronize");
            return SyncResult::nothing_to_sync();
        }

        let records: Vec<WireRecord> = pending.iter().map(WireRecord::from).collect();
        info!(count = records.len(), "Synchronizing pending events");

        let response = match self.remote.sync_batch(&records).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Synchronization failed; queue left untouched");
                return SyncResult::from(e);
            }
        };

        let confirmed = match self.confirmed_ids(&pending, &response) {
            Some(ids) => ids,
            None => {
                warn!("Remote authority did not acknowledge individual events; queue left untouched");
                return SyncResult::failure(
                    SyncFailure::Unacknowledged,
                    "Server did not acknowledge individual events",
                );
            }
        };

        if response.failed_count > 0 {
            match self.policy {
                AckPolicy::TrustBatch => warn!(
                    failed = response.failed_count,
                    errors = ?response.errors,
                    "Remote authority rejected part of the batch; rejected events are dropped from the queue"
                ),
                AckPolicy::PerRecord => warn!(
                    failed = response.failed_count,
                    errors = ?response.errors,
                    "Remote authority rejected part of the batch; unacknowledged events stay queued"
                ),
            }
        }

        for id in &confirmed {
            if let Err(e) = self.queue.mark_synced(*id).await {
                // Left pending; it is transmitted again on the next pass
                warn!(id, error = %e, "Failed to mark event as synced");
            }
        }

        match self.queue.purge_synced().await {
            Ok(report) if report.failed > 0 => {
                warn!(failed = report.failed, "Some synced events could not be purged")
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to purge synced events"),
        }

        info!(
            synced = response.synced_count,
            failed = response.failed_count,
            "Synchronization finished"
        );
        SyncResult::success(response.synced_count, response.failed_count)
    }

    /// Queue ids confirmed by `response` under the active policy
    ///
    /// `None` when per-record acknowledgement is required but absent.
    fn confirmed_ids(
        &self,
        pending: &[PendingEvent],
        response: &SyncResponse,
    ) -> Option<Vec<i64>> {
        match self.policy {
            AckPolicy::TrustBatch => Some(pending.iter().map(|e| e.id).collect()),
            AckPolicy::PerRecord => {
                let accepted = response.accepted.as_ref()?;
                let mut ids: Vec<i64> = accepted
                    .iter()
                    .filter_map(|&index| pending.get(index))
                    .map(|e| e.id)
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                Some(ids)
            }
        }
    }
}
