//! In-process record store, used by tests and dry runs

use crate::storage::traits::{
    child_names, normalize_prefix, validate_key, PutOutcome, RecordStore, StoreError, StoreResult,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Record store that keeps everything in a shared map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    /// Returns every key currently stored, in order
    pub fn keys(&self) -> Vec<String> {
        self.records()
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of stored keys
    pub fn len(&self) -> usize {
        self.records().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads a value as UTF-8 text
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.records()
            .ok()?
            .get(key)
            .map(|body| String::from_utf8_lossy(body).into_owned())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, key: &str, body: &[u8]) -> StoreResult<PutOutcome> {
        validate_key(key)?;
        let previous = self.records()?.insert(key.to_string(), body.to_vec());
        Ok(match previous {
            Some(_) => PutOutcome::Overwritten,
            None => PutOutcome::Created,
        })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.records()?.get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = normalize_prefix(prefix)?;
        let records = self.records()?;
        Ok(child_names(
            &prefix,
            records
                .range(prefix.clone()..)
                .map(|(key, _)| key.as_str())
                .take_while(|key| key.starts_with(prefix.as_str())),
        ))
    }
}
