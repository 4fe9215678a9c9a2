//! Deferred background sync registrations
//!
//! A registration is a tag the proxy should be asked to sync once the
//! network is available. Failed dispatches are retried with backoff:
//!
//! - Retry delays: 30s → 60s → 300s, one after each of the first three failures
//! - Dropped on the `MAX_ATTEMPTS`th (fourth) failed dispatch
//! - Coming back online makes every waiting registration due immediately

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::CachingProxy;

/// Tag under which queued clock events are synced
pub const SYNC_TAG: &str = "sync-registros";

/// Failed dispatches tolerated before a registration is discarded
pub const MAX_ATTEMPTS: u32 = 4;

/// Delay before each retry, indexed by failed attempts so far
pub const RETRY_DELAYS: [Duration; MAX_ATTEMPTS as usize - 1] = [
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(300),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    tag: String,
    attempts: u32,
    not_before: Option<Instant>,
}

/// What happened to a registration on dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler succeeded; registration removed
    Completed { tag: String },
    /// Handler failed; retried after `retry_in`
    Rescheduled { tag: String, attempts: u32, retry_in: Duration },
    /// Handler failed for the last allowed time; registration removed
    Dropped { tag: String, attempts: u32 },
}

/// Retry scheduler for background sync registrations
#[derive(Debug, Default)]
pub struct BackgroundSync {
    registrations: Vec<Registration>,
    online: bool,
}

impl BackgroundSync {
    pub fn new(online: bool) -> Self {
        Self {
            registrations: Vec::new(),
            online,
        }
    }

    /// Register `tag`; an existing registration is reset to zero attempts
    pub fn register(&mut self, tag: &str) {
        match self.registrations.iter_mut().find(|r| r.tag == tag) {
            Some(existing) => {
                existing.attempts = 0;
                existing.not_before = None;
                debug!(tag, "Background sync re-registered");
            }
            None => {
                self.registrations.push(Registration {
                    tag: tag.to_string(),
                    attempts: 0,
                    not_before: None,
                });
                debug!(tag, "Background sync registered");
            }
        }
    }

    pub fn unregister(&mut self, tag: &str) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.tag != tag);
        self.registrations.len() != before
    }

    pub fn tags(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.tag.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Update network state; going online clears pending backoff
    pub fn set_online(&mut self, online: bool) {
        if online && !self.online {
            for registration in &mut self.registrations {
                registration.not_before = None;
            }
        }
        self.online = online;
    }

    /// Tags ready to dispatch at `now`; none while offline
    pub fn due(&self, now: Instant) -> Vec<String> {
        if !self.online {
            return Vec::new();
        }
        self.registrations
            .iter()
            .filter(|r| r.not_before.map_or(true, |t| t <= now))
            .map(|r| r.tag.clone())
            .collect()
    }

    /// Record the result of dispatching `tag`
    pub fn report(&mut self, tag: &str, succeeded: bool, now: Instant) -> Option<DispatchOutcome> {
        let index = self.registrations.iter().position(|r| r.tag == tag)?;

        if succeeded {
            self.registrations.remove(index);
            info!(tag, "Background sync completed");
            return Some(DispatchOutcome::Completed {
                tag: tag.to_string(),
            });
        }

        let registration = &mut self.registrations[index];
        registration.attempts += 1;
        let attempts = registration.attempts;

        if attempts >= MAX_ATTEMPTS {
            self.registrations.remove(index);
            warn!(tag, attempts, "Background sync abandoned after repeated failures");
            return Some(DispatchOutcome::Dropped {
                tag: tag.to_string(),
                attempts,
            });
        }

        let delay_index = (attempts as usize - 1).min(RETRY_DELAYS.len() - 1);
        let retry_in = RETRY_DELAYS[delay_index];
        registration.not_before = Some(now + retry_in);
        info!(tag, attempts, retry_in_secs = retry_in.as_secs(), "Background sync will retry");
        Some(DispatchOutcome::Rescheduled {
            tag: tag.to_string(),
            attempts,
            retry_in,
        })
    }

    /// Dispatch every due registration to `proxy`
    pub async fn dispatch(&mut self, proxy: &CachingProxy, now: Instant) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();
        for tag in self.due(now) {
            let succeeded = match proxy.on_sync(&tag).await {
                Ok(_) => true,
                Err(e) => {
                    warn!(tag = %tag, error = %e, "Background sync failed");
                    false
                }
            };
            if let Some(outcome) = self.report(&tag, succeeded, now) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}
