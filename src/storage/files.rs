//! Flat-file record store
//!
//! Every key maps to a file below the root directory. Writes go to a hidden
//! temporary sibling first and are renamed into place, so a crash never
//! leaves a half-written record behind.

use crate::storage::traits::{
    normalize_prefix, validate_key, PutOutcome, RecordStore, StoreResult,
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Record store backed by a directory tree
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    // Serializes the exists check and the rename so concurrent writers of one
    // key agree on which of them created it
    commit_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Creates a store rooted at `root`
    ///
    /// The directory is created lazily by the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn put(&self, key: &str, body: &[u8]) -> StoreResult<PutOutcome> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sequence = TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, sequence));
        tokio::fs::write(&tmp_path, body).await?;

        let _guard = self.commit_lock.lock().await;
        let existed = tokio::fs::try_exists(&path).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        Ok(if existed {
            PutOutcome::Overwritten
        } else {
            PutOutcome::Created
        })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let prefix = normalize_prefix(prefix)?;
        let dir = self.root.join(prefix.trim_end_matches('/'));

        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Skip in-flight temporaries
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}
