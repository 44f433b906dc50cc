//! SQLite record store
//!
//! Keeps the same key hierarchy as the file store, one row per key. All
//! statements run on the blocking pool behind a single connection lock.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    child_names, normalize_prefix, validate_key, PutOutcome, RecordStore, StoreError, StoreResult,
};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite storage backend
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("sqlite task failed: {}", e)))?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn put(&self, key: &str, body: &[u8]) -> StoreResult<PutOutcome> {
        validate_key(key)?;
        let key = key.to_string();
        let body = body.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let existed = tx
                .query_row("SELECT 1 FROM records WHERE key = ?1", params![key], |_| {
                    Ok(())
                })
                .optional()?
                .is_some();
            tx.execute(
                "INSERT INTO records (key, body, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                params![key, body, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;

            Ok(if existed {
                PutOutcome::Overwritten
            } else {
                PutOutcome::Created
            })
        })
        .await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let key = key.to_string();

        self.with_conn(move |conn| {
            let body = conn
                .query_row(
                    "SELECT body FROM records WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?;
            Ok(body)
        })
        .await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = normalize_prefix(prefix)?;

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT key FROM records WHERE substr(key, 1, ?2) = ?1")?;
            let keys = stmt
                .query_map(params![prefix, prefix.len() as i64], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(child_names(&prefix, keys.iter().map(String::as_str)))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteStore::new_in_memory().unwrap();

        assert_eq!(
            store.put("profiles/7.json", b"{}").await.unwrap(),
            PutOutcome::Created
        );
        assert_eq!(
            store.put("profiles/7.json", b"{\"id\":7}").await.unwrap(),
            PutOutcome::Overwritten
        );
        assert_eq!(
            store.get("profiles/7.json").await.unwrap().unwrap(),
            b"{\"id\":7}"
        );
        assert!(store.get("profiles/8.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_children() {
        let store = SqliteStore::new_in_memory().unwrap();

        store.put("comments/-1/42/post.json", b"{}").await.unwrap();
        store.put("comments/-1/42/7.json", b"{}").await.unwrap();
        store.put("comments/-1/offset.txt", b"20").await.unwrap();
        store.put("comments/-10/count.txt", b"5").await.unwrap();

        assert_eq!(
            store.list("comments/-1").await.unwrap(),
            vec!["42", "offset.txt"]
        );
        assert_eq!(store.list("comments").await.unwrap(), vec!["-1", "-10"]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/records.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.put("PostsCounter.txt", b"3").await.unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.get("PostsCounter.txt").await.unwrap().unwrap(), b"3");
    }
}
