//! Storage traits and error types
//!
//! This module defines the trait interface for record store backends and
//! associated error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record key: {0:?}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// What a successful write did to the key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key did not exist before
    Created,

    /// An existing value was replaced
    Overwritten,
}

impl PutOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

/// Trait for durable key → blob persistence
///
/// Keys are `/`-separated paths such as `comments/-1/42/post.json`. Writing a
/// key creates whatever parents it needs, and writing the same key twice
/// replaces the value, so re-persisting a page is harmless.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Writes `body` under `key`, replacing any previous value
    async fn put(&self, key: &str, body: &[u8]) -> StoreResult<PutOutcome>;

    /// Reads the value stored under `key`
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Lists the names directly below `prefix`, sorted
    ///
    /// For keys `a/b/c.json` and `a/d.json`, `list("a")` returns `["b", "d.json"]`.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Rejects keys that could escape the store root or alias other keys
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') || key.contains('\\') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Normalizes a list prefix to either `""` or `"segment/.../"`
pub(crate) fn normalize_prefix(prefix: &str) -> StoreResult<String> {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    validate_key(trimmed)?;
    Ok(format!("{}/", trimmed))
}

/// Reduces full keys below `prefix` to their first path segment
pub(crate) fn child_names<'a>(prefix: &str, keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = keys
        .filter_map(|key| key.strip_prefix(prefix))
        .filter_map(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();
    names
}
