//! Storage module for persisting harvested records
//!
//! This module handles durable key → blob persistence, including:
//! - The `RecordStore` trait and its error type
//! - Flat-file, SQLite and in-memory backends
//! - The key layout shared by all backends

pub mod keys;
mod files;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use files::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{validate_key, PutOutcome, RecordStore, StoreError, StoreResult};

use crate::config::{OutputConfig, StoreBackend};
use serde::Serialize;
use std::sync::Arc;

/// Opens the record store selected by the output configuration
///
/// # Arguments
///
/// * `config` - The output section of the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn RecordStore>)` - Store ready for use
/// * `Err(StoreError)` - The SQLite database could not be opened
pub fn open_store(config: &OutputConfig) -> StoreResult<Arc<dyn RecordStore>> {
    match config.backend {
        StoreBackend::Files => {
            tracing::debug!("Using file store at {}", config.data_dir.display());
            Ok(Arc::new(FileStore::new(&config.data_dir)))
        }
        StoreBackend::Sqlite => {
            let path = config.database_path();
            tracing::debug!("Using SQLite store at {}", path.display());
            Ok(Arc::new(SqliteStore::new(&path)?))
        }
    }
}

/// Serializes `value` as JSON and writes it under `key`
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn RecordStore,
    key: &str,
    value: &T,
) -> StoreResult<PutOutcome> {
    let body = serde_json::to_vec(value)?;
    store.put(key, &body).await
}
