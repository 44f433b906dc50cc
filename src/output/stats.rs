//! Progress statistics from the checkpoint ledger
//!
//! Used for the resume report at startup and for `--stats`.

use crate::ledger::{Checkpoint, CheckpointLedger, Counters, LedgerResult};
use crate::storage::RecordStore;
use std::sync::Arc;

/// Resume position of one source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProgress {
    pub source_id: String,
    pub checkpoint: Checkpoint,
}

/// Snapshot of everything the ledger knows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    /// Sources with a checkpoint, ordered by id
    pub sources: Vec<SourceProgress>,

    /// Global record counters
    pub counters: Counters,
}

impl CrawlStatistics {
    /// Builds statistics from an already loaded ledger
    pub fn from_ledger(ledger: &CheckpointLedger) -> Self {
        let sources = ledger
            .checkpoints()
            .into_iter()
            .map(|(source_id, checkpoint)| SourceProgress {
                source_id,
                checkpoint,
            })
            .collect();

        Self {
            sources,
            counters: ledger.counters(),
        }
    }

    /// Number of sources whose offset has caught up with their total
    pub fn complete_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.checkpoint.is_complete())
            .count()
    }

    /// Posts persisted and posts reported, summed over all sources
    pub fn post_totals(&self) -> (u64, u64) {
        self.sources.iter().fold((0, 0), |(offset, total), s| {
            (offset + s.checkpoint.offset, total + s.checkpoint.total)
        })
    }
}

/// Loads statistics straight from a store
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Checkpoints and counter snapshot
/// * `Err(LedgerError)` - The store could not be read or holds garbage
pub async fn load_statistics(store: Arc<dyn RecordStore>) -> LedgerResult<CrawlStatistics> {
    let ledger = CheckpointLedger::new(store);
    ledger.load_all().await?;
    Ok(CrawlStatistics::from_ledger(&ledger))
}

/// Logs the per-source resume report
pub fn log_progress_report(stats: &CrawlStatistics) {
    for progress in &stats.sources {
        tracing::info!(
            "Source {}: {}/{} ({:.1}%)",
            progress.source_id,
            progress.checkpoint.offset,
            progress.checkpoint.total,
            progress.checkpoint.percent()
        );
    }
    let (offset, total) = stats.post_totals();
    tracing::info!(
        "{} sources with progress, {} complete, {}/{} posts; {}",
        stats.sources.len(),
        stats.complete_sources(),
        offset,
        total,
        stats.counters
    );
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Records:");
    println!("  Posts: {}", stats.counters.posts);
    println!("  Comments: {}", stats.counters.comments);
    println!("  Profiles: {}", stats.counters.profiles);
    println!();

    if stats.sources.is_empty() {
        println!("No source has been crawled yet.");
        return;
    }

    println!("Sources ({}):", stats.sources.len());
    for progress in &stats.sources {
        let marker = if progress.checkpoint.is_complete() {
            "✓"
        } else {
            " "
        };
        println!(
            "  {} {}: {}/{} ({:.1}%)",
            marker,
            progress.source_id,
            progress.checkpoint.offset,
            progress.checkpoint.total,
            progress.checkpoint.percent()
        );
    }
    println!();

    let (offset, total) = stats.post_totals();
    let overall = Checkpoint::new(offset, total).percent();
    println!(
        "Overall: {:.1}% ({} / {} posts, {} of {} sources complete)",
        overall,
        offset,
        total,
        stats.complete_sources(),
        stats.sources.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_load_statistics() {
        let store = MemoryStore::new();
        store.put("comments/-1/offset.txt", b"20").await.unwrap();
        store.put("comments/-1/count.txt", b"20").await.unwrap();
        store.put("comments/-2/offset.txt", b"5").await.unwrap();
        store.put("comments/-2/count.txt", b"15").await.unwrap();
        store.put("PostsCounter.txt", b"12").await.unwrap();

        let stats = load_statistics(Arc::new(store)).await.unwrap();

        assert_eq!(stats.sources.len(), 2);
        assert_eq!(stats.sources[0].source_id, "-1");
        assert_eq!(stats.complete_sources(), 1);
        assert_eq!(stats.post_totals(), (25, 35));
        assert_eq!(stats.counters.posts, 12);
    }

    #[tokio::test]
    async fn test_empty_store_has_no_progress() {
        let stats = load_statistics(Arc::new(MemoryStore::new())).await.unwrap();
        assert_eq!(stats, CrawlStatistics::default());
        assert_eq!(stats.post_totals(), (0, 0));
    }
}
