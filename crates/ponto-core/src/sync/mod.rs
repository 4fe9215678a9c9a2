//! Queue reconciliation against the remote authority
//!
//! ## Protocol
//!
//! 1. Read every pending event, oldest first
//! 2. Project each to its wire shape and send the batch in one request
//! 3. On transport failure, stop; the queue is retried verbatim next time
//! 4. On a response, mark confirmed events synced and purge them
//!
//! ## Usage
//!
//! ```ignore
//! let coordinator = SyncCoordinator::new(queue, remote);
//! let result = coordinator.synchronize().await;
//! ```

mod coordinator;
mod result;

pub use coordinator::{AckPolicy, SyncCoordinator};
pub use result::{SyncFailure, SyncOutcome, SyncResult};
