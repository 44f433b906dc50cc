//! Checkpoint ledger: per-source resume positions and global record counters
//!
//! The ledger owns two kinds of durable state:
//! - one `(offset, total)` checkpoint per source, stored next to its records
//! - three process-wide counters (posts, profiles, comments)
//!
//! Counters are loaded from their last flushed snapshot and only ever count
//! records the store reports as newly created, so re-persisting a page after a
//! resume does not inflate them. `recount` rebuilds them from the stored
//! records when the snapshot is known to be off.

mod types;

pub use types::{Checkpoint, Counters, RecordKind};

use crate::storage::{keys, RecordStore, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors that can occur while reading or writing ledger state
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Corrupt ledger value at {key}: {value:?}")]
    Corrupt { key: String, value: String },
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Durable checkpoints and counters shared by all source crawlers
pub struct CheckpointLedger {
    store: Arc<dyn RecordStore>,
    posts: AtomicU64,
    profiles: AtomicU64,
    comments: AtomicU64,
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl CheckpointLedger {
    /// Creates an empty ledger on top of `store`
    ///
    /// Call [`CheckpointLedger::load_all`] before crawling to pick up state
    /// from previous runs.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            posts: AtomicU64::new(0),
            profiles: AtomicU64::new(0),
            comments: AtomicU64::new(0),
            checkpoints: Mutex::new(HashMap::new()),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn checkpoints_guard(&self) -> MutexGuard<'_, HashMap<String, Checkpoint>> {
        self.checkpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn counter(&self, kind: RecordKind) -> &AtomicU64 {
        match kind {
            RecordKind::Post => &self.posts,
            RecordKind::Profile => &self.profiles,
            RecordKind::Comment => &self.comments,
        }
    }

    /// Loads counters and every stored checkpoint
    ///
    /// The counter snapshot is added to whatever the ledger already holds.
    /// Missing files count as zero; a store with no prior state is valid.
    pub async fn load_all(&self) -> LedgerResult<Counters> {
        for (kind, key) in counter_keys() {
            let stored = self.read_number(key).await?.unwrap_or(0);
            self.counter(kind).fetch_add(stored, Ordering::SeqCst);
        }

        let mut loaded = HashMap::new();
        for source_id in self.store.list(keys::COMMENTS_DIR).await? {
            let offset_key = keys::offset_key(&source_id);
            let Some(offset) = self.read_number(&offset_key).await? else {
                tracing::debug!("No offset data for source {}", source_id);
                continue;
            };
            let total = self
                .read_number(&keys::count_key(&source_id))
                .await?
                .unwrap_or(0);
            loaded.insert(source_id, Checkpoint::new(offset, total));
        }

        let count = loaded.len();
        self.checkpoints_guard().extend(loaded);

        let counters = self.counters();
        tracing::debug!(
            "Ledger loaded: {} checkpoints, {}",
            count,
            counters
        );
        Ok(counters)
    }

    /// Returns the checkpoint of a source, if one was loaded or committed
    pub fn checkpoint(&self, source_id: &str) -> Option<Checkpoint> {
        self.checkpoints_guard().get(source_id).copied()
    }

    /// Returns all known checkpoints ordered by source id
    pub fn checkpoints(&self) -> BTreeMap<String, Checkpoint> {
        self.checkpoints_guard()
            .iter()
            .map(|(source, checkpoint)| (source.clone(), *checkpoint))
            .collect()
    }

    /// Returns the current in-memory counters
    pub fn counters(&self) -> Counters {
        Counters {
            posts: self.posts.load(Ordering::SeqCst),
            profiles: self.profiles.load(Ordering::SeqCst),
            comments: self.comments.load(Ordering::SeqCst),
        }
    }

    /// Counts one persisted record
    pub fn record_persisted(&self, kind: RecordKind) {
        self.counter(kind).fetch_add(1, Ordering::SeqCst);
    }

    /// Writes the current counters to the store
    ///
    /// Concurrent flushes are serialized and each one reads the counters only
    /// after taking the lock, so the snapshot on disk never goes backwards.
    pub async fn flush(&self) -> LedgerResult<Counters> {
        let _guard = self.flush_lock.lock().await;
        let counters = self.counters();
        for (kind, key) in counter_keys() {
            self.store
                .put(key, counters.get(kind).to_string().as_bytes())
                .await?;
        }
        tracing::trace!("Flushed counters ({})", counters);
        Ok(counters)
    }

    /// Makes a page's progress durable
    ///
    /// Must only be called after every record of the page has been written.
    /// Counters are flushed first, then the total, and the offset last: a
    /// crash at any point leaves the offset at its previous value and the page
    /// is fetched again.
    pub async fn commit_page(&self, source_id: &str, checkpoint: Checkpoint) -> LedgerResult<()> {
        self.flush().await?;
        self.store
            .put(
                &keys::count_key(source_id),
                checkpoint.total.to_string().as_bytes(),
            )
            .await?;
        self.store
            .put(
                &keys::offset_key(source_id),
                checkpoint.offset.to_string().as_bytes(),
            )
            .await?;
        self.checkpoints_guard()
            .insert(source_id.to_string(), checkpoint);
        Ok(())
    }

    /// Rebuilds the counters from the records actually stored
    ///
    /// Replaces the in-memory counters (it does not add to them) and flushes
    /// the result, so it is safe to run on a ledger that already loaded a
    /// snapshot.
    pub async fn recount(&self) -> LedgerResult<Counters> {
        let mut counted = Counters::default();

        for source_id in self.store.list(keys::COMMENTS_DIR).await? {
            for post_id in self.store.list(&keys::source_dir(&source_id)).await? {
                if post_id == keys::OFFSET_FILE || post_id == keys::COUNT_FILE {
                    continue;
                }
                for name in self.store.list(&keys::post_dir(&source_id, &post_id)).await? {
                    if name == keys::POST_FILE {
                        counted.posts += 1;
                    } else if name.ends_with(".json") {
                        counted.comments += 1;
                    }
                }
            }
        }

        counted.profiles = self
            .store
            .list(keys::PROFILES_DIR)
            .await?
            .iter()
            .filter(|name| name.ends_with(".json"))
            .count() as u64;

        {
            let _guard = self.flush_lock.lock().await;
            self.posts.store(counted.posts, Ordering::SeqCst);
            self.profiles.store(counted.profiles, Ordering::SeqCst);
            self.comments.store(counted.comments, Ordering::SeqCst);
        }

        tracing::info!("Recounted stored records ({})", counted);
        self.flush().await
    }

    async fn read_number(&self, key: &str) -> LedgerResult<Option<u64>> {
        let Some(body) = self.store.get(key).await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&body);
        let value = text.trim();
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| LedgerError::Corrupt {
                key: key.to_string(),
                value: value.to_string(),
            })
    }
}

fn counter_keys() -> [(RecordKind, &'static str); 3] {
    [
        (RecordKind::Post, keys::POSTS_COUNTER),
        (RecordKind::Profile, keys::PROFILES_COUNTER),
        (RecordKind::Comment, keys::COMMENTS_COUNTER),
    ]
}
