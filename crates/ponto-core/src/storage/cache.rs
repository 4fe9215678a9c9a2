//! Persisted cache generations for the caching proxy
//!
//! A generation is a named bucket of responses keyed by request URL. The
//! store knows nothing about naming schemes or versions; the proxy decides
//! which names are current and which are stale.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::proxy::ProxyResponse;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::queue::configure_durability;
use crate::storage::schema::{init_cache_schema, needs_init};

/// On-disk store of cache generations
pub struct CacheStorage {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl CacheStorage {
    /// Open or create the cache database at `path`
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
            }
        }

        let conn = Connection::open(&path).map_err(|e| StorageError::Unavailable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        prepare(&conn)?;

        info!(path = ?path, "Cache storage opened");
        Ok(Self {
            path: Some(path),
            conn: Mutex::new(conn),
        })
    }

    /// Open a cache that lives only in memory (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        prepare(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Names of every generation, oldest first
    pub async fn generations(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT name FROM cache_generations ORDER BY created_at, name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let names = rows.collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Whether a generation with this name exists
    pub async fn has_generation(&self, name: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().await;
        let exists = conn
            .prepare("SELECT 1 FROM cache_generations WHERE name = ?")?
            .exists(params![name])?;
        Ok(exists)
    }

    /// Store one response, creating the generation if needed
    ///
    /// An existing entry for the same key is replaced.
    pub async fn put(
        &self,
        generation: &str,
        key: &str,
        response: &ProxyResponse,
    ) -> StorageResult<()> {
        let headers = serde_json::to_string(&response.headers)?;
        let conn = self.conn.lock().await;
        let now = Utc::now().timestamp_millis();

        ensure_generation(&conn, generation, now)?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (generation, request_key, status, headers, body, stored_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![generation, key, response.status, headers, response.body, now],
        )
        .map_err(|e| StorageError::write(format!("cache entry '{key}'"), e))?;

        debug!(generation, key, status = response.status, "Cached response");
        Ok(())
    }

    /// Store a whole set of responses in one transaction
    ///
    /// Either every entry is written or none is.
    pub async fn put_all(
        &self,
        generation: &str,
        entries: &[(String, ProxyResponse)],
    ) -> StorageResult<()> {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, resp) in entries {
            encoded.push((key, resp, serde_json::to_string(&resp.headers)?));
        }

        let mut conn = self.conn.lock().await;
        let now = Utc::now().timestamp_millis();
        let tx = conn.transaction()?;

        ensure_generation(&tx, generation, now)?;
        for (key, resp, headers) in &encoded {
            tx.execute(
                "INSERT OR REPLACE INTO cache_entries (generation, request_key, status, headers, body, stored_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![generation, key, resp.status, headers, resp.body, now],
            )
            .map_err(|e| StorageError::write(format!("cache entry '{key}'"), e))?;
        }
        tx.commit()?;

        debug!(generation, count = entries.len(), "Cached response set");
        Ok(())
    }

    /// Look up a response in one generation
    pub async fn match_in(&self, generation: &str, key: &str) -> StorageResult<Option<ProxyResponse>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT status, headers, body FROM cache_entries WHERE generation = ? AND request_key = ?",
                params![generation, key],
                |row| Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
            )
            .optional()?;
        decode_row(row)
    }

    /// Look up a response, trying `preferred` generations in order, then any other
    pub async fn match_any(
        &self,
        key: &str,
        preferred: &[String],
    ) -> StorageResult<Option<ProxyResponse>> {
        for generation in preferred {
            if let Some(found) = self.match_in(generation, key).await? {
                return Ok(Some(found));
            }
        }

        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT status, headers, body FROM cache_entries WHERE request_key = ?
                 ORDER BY stored_at DESC LIMIT 1",
                params![key],
                |row| Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
            )
            .optional()?;
        decode_row(row)
    }

    /// Delete a generation and all its entries
    ///
    /// Returns whether the generation existed.
    pub async fn delete_generation(&self, name: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().await;
        let removed = conn
            .execute("DELETE FROM cache_generations WHERE name = ?", params![name])
            .map_err(|e| StorageError::write(format!("deletion of generation '{name}'"), e))?;
        if removed > 0 {
            info!(generation = name, "Deleted cache generation");
        }
        Ok(removed > 0)
    }

    /// Read a value from the store's metadata table
    pub async fn get_meta(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn.lock().await;
        let value = conn
            .query_row(
                "SELECT value FROM schema_info WHERE key = ?",
                params![format!("meta:{key}")],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write a value to the store's metadata table
    pub async fn set_meta(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO schema_info (key, value) VALUES (?, ?)",
            params![format!("meta:{key}"), value],
        )
        .map_err(|e| StorageError::write(format!("metadata '{key}'"), e))?;
        Ok(())
    }

    /// Number of entries stored in a generation
    pub async fn entry_count(&self, generation: &str) -> StorageResult<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE generation = ?",
            params![generation],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn prepare(conn: &Connection) -> StorageResult<()> {
    configure_durability(conn)?;
    if needs_init(conn) {
        init_cache_schema(conn)?;
    }
    Ok(())
}

fn ensure_generation(conn: &Connection, name: &str, now: i64) -> StorageResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_generations (name, created_at) VALUES (?, ?)",
        params![name, now],
    )
    .map_err(|e| StorageError::write(format!("generation '{name}'"), e))?;
    Ok(())
}

fn decode_row(row: Option<(u16, String, Vec<u8>)>) -> StorageResult<Option<ProxyResponse>> {
    match row {
        Some((status, headers, body)) => Ok(Some(ProxyResponse {
            status,
            headers: serde_json::from_str(&headers)?,
            body,
        })),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page(body: &str) -> ProxyResponse {
        ProxyResponse::new(200, body).with_header("Content-Type", "text/html")
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let cache = CacheStorage::open_in_memory().unwrap();
        cache.put("ponto-v1-static", "http://x/", &page("home")).await.unwrap();

        let found = cache.match_in("ponto-v1-static", "http://x/").await.unwrap().unwrap();
        assert_eq!(found.body, b"home");
        assert_eq!(found.header("content-type"), Some("text/html"));

        assert!(cache.match_in("ponto-v1-dynamic", "http://x/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_entry() {
        let cache = CacheStorage::open_in_memory().unwrap();
        cache.put("g", "k", &page("old")).await.unwrap();
        cache.put("g", "k", &page("new")).await.unwrap();

        assert_eq!(cache.entry_count("g").await.unwrap(), 1);
        let found = cache.match_in("g", "k").await.unwrap().unwrap();
        assert_eq!(found.body, b"new");
    }

    #[tokio::test]
    async fn test_match_any_prefers_listed_generations() {
        let cache = CacheStorage::open_in_memory().unwrap();
        cache.put("a", "k", &page("from-a")).await.unwrap();
        cache.put("b", "k", &page("from-b")).await.unwrap();

        let found = cache
            .match_any("k", &["b".to_string(), "a".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.body, b"from-b");

        let fallback = cache.match_any("k", &[]).await.unwrap();
        assert!(fallback.is_some());
        assert!(cache.match_any("missing", &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_all_creates_generation() {
        let cache = CacheStorage::open_in_memory().unwrap();
        let entries = vec![
            ("http://x/".to_string(), page("home")),
            ("http://x/app.js".to_string(), page("js")),
        ];
        cache.put_all("ponto-v1-static", &entries).await.unwrap();

        assert_eq!(cache.generations().await.unwrap(), vec!["ponto-v1-static"]);
        assert_eq!(cache.entry_count("ponto-v1-static").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_generation_cascades() {
        let cache = CacheStorage::open_in_memory().unwrap();
        cache.put("old", "k", &page("x")).await.unwrap();
        cache.put("new", "k", &page("y")).await.unwrap();

        assert!(cache.delete_generation("old").await.unwrap());
        assert!(!cache.delete_generation("old").await.unwrap());

        assert!(!cache.has_generation("old").await.unwrap());
        assert_eq!(cache.entry_count("old").await.unwrap(), 0);
        assert_eq!(cache.generations().await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_meta_round_trip() {
        let cache = CacheStorage::open_in_memory().unwrap();
        assert!(cache.get_meta("active_version").await.unwrap().is_none());

        cache.set_meta("active_version", "v1").await.unwrap();
        cache.set_meta("active_version", "v2").await.unwrap();
        assert_eq!(
            cache.get_meta("active_version").await.unwrap().as_deref(),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cache").join("cache.db");

        {
            let cache = CacheStorage::open(&path).unwrap();
            cache.put("g", "k", &page("persisted")).await.unwrap();
        }

        let cache = CacheStorage::open(&path).unwrap();
        let found = cache.match_in("g", "k").await.unwrap().unwrap();
        assert_eq!(found.body, b"persisted");
    }
}
