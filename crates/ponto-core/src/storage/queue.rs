//! Durable local queue of pending clock events
//!
//! Events captured while disconnected are persisted here until the sync
//! coordinator confirms remote acceptance. Records are stored in SQLite:
//!
//! - Each single-record operation (append, mark, purge-one) is its own
//!   statement and therefore atomic.
//! - There is no cross-record transaction. A crash between marking two
//!   records leaves a valid, partially advanced store, so `mark_synced`
//!   and `purge_synced` are idempotent and safe to re-invoke.
//! - Ids come from `AUTOINCREMENT` and are never reused.
//!
//! Insertion order is transmission order: `list_pending` always returns
//! oldest first.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{ClockEvent, ClockType, Coordinates, PendingEvent, PhotoPayload, SyncStatus};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{init_queue_schema, needs_init};

const SELECT_COLUMNS: &str =
    "SELECT id, clock_type, latitude, longitude, photo, created_at, sync_status FROM pending_events";

/// Outcome of a purge pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Records deleted
    pub removed: usize,
    /// Records whose deletion failed (left in place for the next pass)
    pub failed: usize,
}

/// On-device store of pending events
///
/// The connection is opened lazily: any operation initializes the store
/// on first use, and `initialize` may be called any number of times.
pub struct LocalQueue {
    /// Database file; `None` for an in-memory store
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
}

impl LocalQueue {
    /// Create a queue backed by the given database file (not opened yet)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            conn: Mutex::new(None),
        }
    }

    /// Create a queue at the configured location
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.queue_path())
    }

    /// Create a queue that lives only as long as this value (for testing)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            conn: Mutex::new(None),
        }
    }

    /// Location of the database file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Open or create the store
    ///
    /// Fails with `StorageError::Unavailable` when persistent storage is
    /// denied. Subsequent calls after a successful one are no-ops.
    pub async fn initialize(&self) -> StorageResult<()> {
        let mut guard = self.conn.lock().await;
        let slot: &mut Option<Connection> = &mut guard;
        if slot.is_none() {
            *slot = Some(open_connection(self.path.as_deref())?);
            info!(path = ?self.path, "Local queue initialized");
        }
        Ok(())
    }

    /// Whether the store has been opened
    pub async fn is_initialized(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Persist a new event as `pending` and return its id
    ///
    /// The insert is a single statement: on failure no partial record
    /// remains and `StorageError::Write` is returned.
    pub async fn append(&self, event: &ClockEvent) -> StorageResult<i64> {
        self.with_conn(|conn| {
            let (latitude, longitude) = match event.coordinates {
                Some(c) => (Some(c.latitude), Some(c.longitude)),
                None => (None, None),
            };
            conn.execute(
                "INSERT INTO pending_events (clock_type, latitude, longitude, photo, created_at, sync_status)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    event.clock_type.as_str(),
                    latitude,
                    longitude,
                    event.photo.as_ref().map(|p| p.as_str()),
                    Utc::now().timestamp_millis(),
                    SyncStatus::Pending.as_str(),
                ],
            )
            .map_err(|e| StorageError::write("pending event", e))?;

            let id = conn.last_insert_rowid();
            debug!(id, clock_type = %event.clock_type, "Queued event");
            Ok(id)
        })
        .await
    }

    /// All `pending` records, oldest first. Never mutates.
    pub async fn list_pending(&self) -> StorageResult<Vec<PendingEvent>> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE sync_status = ? ORDER BY id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![SyncStatus::Pending.as_str()], row_to_event)?;
            let events = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await
    }

    /// Every record still in the store (pending or synced-but-not-purged)
    pub async fn list_all(&self) -> StorageResult<Vec<PendingEvent>> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_event)?;
            let events = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await
    }

    /// Look up a single record
    pub async fn get(&self, id: i64) -> StorageResult<Option<PendingEvent>> {
        self.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![id])?;
            let event = match rows.next()? {
                Some(row) => Some(row_to_event(row)?),
                None => None,
            };
            Ok(event)
        })
        .await
    }

    /// Number of `pending` records
    pub async fn pending_count(&self) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM pending_events WHERE sync_status = ?",
                params![SyncStatus::Pending.as_str()],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }

    /// Mark one record as synced
    ///
    /// Returns whether a record with that id exists. A missing id is not
    /// an error, and marking an already synced record changes nothing.
    pub async fn mark_synced(&self, id: i64) -> StorageResult<bool> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE pending_events SET sync_status = ? WHERE id = ?",
                    params![SyncStatus::Synced.as_str(), id],
                )
                .map_err(|e| StorageError::write(format!("sync status of event {id}"), e))?;
            if changed == 0 {
                debug!(id, "mark_synced: no such event");
            }
            Ok(changed > 0)
        })
        .await
    }

    /// Delete every synced record
    ///
    /// Each deletion is independent: a failure on one record is logged and
    /// counted, and the remaining records are still deleted. Pending records
    /// are never touched.
    pub async fn purge_synced(&self) -> StorageResult<PurgeReport> {
        self.with_conn(|conn| {
            let ids: Vec<i64> = {
                let mut stmt =
                    conn.prepare("SELECT id FROM pending_events WHERE sync_status = ? ORDER BY id")?;
                let rows = stmt.query_map(params![SyncStatus::Synced.as_str()], |row| row.get(0))?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            let mut report = PurgeReport::default();
            for id in ids {
                match conn.execute(
                    "DELETE FROM pending_events WHERE id = ? AND sync_status = ?",
                    params![id, SyncStatus::Synced.as_str()],
                ) {
                    Ok(n) => report.removed += n,
                    Err(e) => {
                        warn!(id, error = %e, "Failed to purge synced event");
                        report.failed += 1;
                    }
                }
            }

            if report.removed > 0 {
                debug!(removed = report.removed, "Purged synced events");
            }
            Ok(report)
        })
        .await
    }

    /// Run `f` against the open connection, initializing the store first if needed
    async fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut guard = self.conn.lock().await;
        let slot: &mut Option<Connection> = &mut guard;
        if slot.is_none() {
            *slot = Some(open_connection(self.path.as_deref())?);
        }
        match slot.as_mut() {
            Some(conn) => f(conn),
            None => Err(StorageError::Unavailable {
                path: self.path.clone().unwrap_or_default(),
                reason: "store is not open".to_string(),
            }),
        }
    }
}

/// Open the database file (creating parent directories) and apply the schema
fn open_connection(path: Option<&Path>) -> StorageResult<Connection> {
    let conn = match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
                }
            }
            Connection::open(path).map_err(|e| StorageError::Unavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        }
        None => Connection::open_in_memory()?,
    };

    configure_durability(&conn).map_err(|e| StorageError::Unavailable {
        path: path.map(Path::to_path_buf).unwrap_or_default(),
        reason: e.to_string(),
    })?;

    if needs_init(&conn) {
        init_queue_schema(&conn).map_err(|e| StorageError::Unavailable {
            path: path.map(Path::to_path_buf).unwrap_or_default(),
            reason: format!("failed to initialize schema: {e}"),
        })?;
    }

    Ok(conn)
}

/// WAL journal with full fsync so an acknowledged append survives a crash
pub(crate) fn configure_durability(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    Ok(())
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<PendingEvent> {
    let clock_type: String = row.get(1)?;
    let clock_type: ClockType = clock_type.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let latitude: Option<f64> = row.get(2)?;
    let longitude: Option<f64> = row.get(3)?;
    let photo: Option<String> = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    let sync_status: String = row.get(6)?;

    Ok(PendingEvent {
        id: row.get(0)?,
        clock_type,
        coordinates: match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        },
        photo: photo.map(PhotoPayload::new),
        created_at: DateTime::<Utc>::from_timestamp_millis(created_at).unwrap_or_default(),
        sync_status: SyncStatus::from_db(&sync_status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(ty: ClockType) -> ClockEvent {
        ClockEvent::new(ty)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let queue = LocalQueue::new(temp_dir.path().join("queue.db"));

        assert!(!queue.is_initialized().await);
        queue.initialize().await.unwrap();
        queue.initialize().await.unwrap();
        assert!(queue.is_initialized().await);
        assert!(temp_dir.path().join("queue.db").exists());
    }

    #[tokio::test]
    async fn test_initialize_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("queue.db");
        let queue = LocalQueue::new(&path);

        queue.initialize().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_initialize_unavailable_storage() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where a directory is expected
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let queue = LocalQueue::new(blocker.join("queue.db"));

        let err = queue.initialize().await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(!queue.is_initialized().await);
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let queue = LocalQueue::in_memory();

        let a = queue.append(&event(ClockType::ClockIn)).await.unwrap();
        let b = queue.append(&event(ClockType::BreakStart)).await.unwrap();
        let c = queue.append(&event(ClockType::BreakEnd)).await.unwrap();

        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_append_sets_pending_and_created_at() {
        let queue = LocalQueue::in_memory();
        let before = Utc::now().timestamp_millis();

        let id = queue
            .append(
                &ClockEvent::new(ClockType::ClockIn)
                    .with_coordinates(Coordinates::new(-23.55, -46.63))
                    .with_photo(PhotoPayload::new("aGVsbG8=")),
            )
            .await
            .unwrap();

        let stored = queue.get(id).await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Pending);
        assert!(stored.created_at.timestamp_millis() >= before);
        assert_eq!(stored.coordinates, Some(Coordinates::new(-23.55, -46.63)));
        assert_eq!(stored.photo.unwrap().as_str(), "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_list_pending_preserves_insertion_order() {
        let queue = LocalQueue::in_memory();
        let order = [
            ClockType::ClockIn,
            ClockType::BreakStart,
            ClockType::BreakEnd,
            ClockType::ClockOut,
        ];
        for ty in order {
            queue.append(&event(ty)).await.unwrap();
        }

        let pending = queue.list_pending().await.unwrap();
        let types: Vec<ClockType> = pending.iter().map(|e| e.clock_type).collect();
        assert_eq!(types, order);
    }

    #[tokio::test]
    async fn test_list_pending_excludes_synced() {
        let queue = LocalQueue::in_memory();
        let a = queue.append(&event(ClockType::ClockIn)).await.unwrap();
        let b = queue.append(&event(ClockType::ClockOut)).await.unwrap();

        queue.mark_synced(a).await.unwrap();

        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);
        assert_eq!(queue.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mark_synced_missing_id_is_noop() {
        let queue = LocalQueue::in_memory();
        assert!(!queue.mark_synced(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_synced_twice_is_idempotent() {
        let queue = LocalQueue::in_memory();
        let id = queue.append(&event(ClockType::ClockIn)).await.unwrap();

        assert!(queue.mark_synced(id).await.unwrap());
        let once = queue.list_all().await.unwrap();
        assert!(queue.mark_synced(id).await.unwrap());
        let twice = queue.list_all().await.unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_purge_only_removes_synced() {
        let queue = LocalQueue::in_memory();
        let a = queue.append(&event(ClockType::ClockIn)).await.unwrap();
        let b = queue.append(&event(ClockType::ClockOut)).await.unwrap();
        queue.mark_synced(a).await.unwrap();

        let report = queue.purge_synced().await.unwrap();
        assert_eq!(report, PurgeReport { removed: 1, failed: 0 });

        let remaining = queue.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);

        let again = queue.purge_synced().await.unwrap();
        assert_eq!(again, PurgeReport::default());
        assert_eq!(queue.list_all().await.unwrap(), remaining);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_purge() {
        let queue = LocalQueue::in_memory();
        let a = queue.append(&event(ClockType::ClockIn)).await.unwrap();
        queue.mark_synced(a).await.unwrap();
        queue.purge_synced().await.unwrap();

        let b = queue.append(&event(ClockType::ClockOut)).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_pending_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");

        let synced_id;
        {
            let queue = LocalQueue::new(&path);
            synced_id = queue.append(&event(ClockType::ClockIn)).await.unwrap();
            queue.append(&event(ClockType::BreakStart)).await.unwrap();
            queue.append(&event(ClockType::BreakEnd)).await.unwrap();
            queue.mark_synced(synced_id).await.unwrap();
        }

        let queue = LocalQueue::new(&path);
        let pending = queue.list_pending().await.unwrap();
        let types: Vec<ClockType> = pending.iter().map(|e| e.clock_type).collect();
        assert_eq!(types, vec![ClockType::BreakStart, ClockType::BreakEnd]);
        assert!(pending.iter().all(|e| e.id != synced_id));
    }

    #[tokio::test]
    async fn test_pending_count() {
        let queue = LocalQueue::in_memory();
        assert_eq!(queue.pending_count().await.unwrap(), 0);

        let id = queue.append(&event(ClockType::ClockIn)).await.unwrap();
        queue.append(&event(ClockType::ClockOut)).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 2);

        queue.mark_synced(id).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }
}
