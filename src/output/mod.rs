//! Reporting for crawl progress and results
//!
//! This module handles:
//! - The per-source resume report logged at startup
//! - The `--stats` listing of checkpoints and counters
//! - The summary logged when a run ends

pub mod stats;
mod summary;

pub use stats::{load_statistics, log_progress_report, print_statistics, CrawlStatistics, SourceProgress};
pub use summary::{log_summary, CrawlSummary, SourceOutcome, SourceSummary};
