//! Storage layer
//!
//! Two SQLite-backed stores live here:
//!
//! - **Local queue** (`queue.db`): pending clock events awaiting
//!   confirmation by the remote authority
//! - **Cache storage** (`cache.db`): versioned response generations used
//!   by the caching proxy

pub mod cache;
pub mod error;
pub mod queue;
pub mod schema;

pub use cache::CacheStorage;
pub use error::{StorageError, StorageResult};
pub use queue::{LocalQueue, PurgeReport};
pub use schema::SCHEMA_VERSION;
