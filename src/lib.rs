//! Wallcrawl: a resumable comment-feed harvester
//!
//! This crate walks a social network's paginated wall/comment feed for many
//! groups at once, normalizes posts, comments and author profiles, and stores
//! them so that an interrupted run picks up where it stopped.

pub mod api;
pub mod config;
pub mod crawler;
pub mod ledger;
pub mod model;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Wallcrawl operations
#[derive(Debug, Error)]
pub enum WallcrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote API error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Persistence error: {0}")]
    Storage(#[from] storage::StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source resolution failed: {0}")]
    Resolve(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No access token found (checked ${env} and {file})")]
    MissingCredential { env: String, file: String },

    #[error("Sources file {0} lists no sources")]
    EmptySources(String),
}

/// Classified failure of a single remote call
///
/// Every call the crawler makes ends up in exactly one of these buckets, and
/// the bucket alone decides what the crawler does next.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Timeouts, connection errors, bad gateways, undecodable bodies
    #[error("transient failure: {0}")]
    Transient(String),

    /// The remote asked us to back off for a while
    #[error("rate limit exceeded (code {code}): {message}")]
    RateLimited { code: i64, message: String },

    /// Any other error the remote reported
    #[error("remote error {code}: {message}")]
    Fatal { code: i64, message: String },
}

impl FetchError {
    /// Returns true if the same request may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal { .. })
    }
}

/// Result type alias for Wallcrawl operations
pub type Result<T> = std::result::Result<T, WallcrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlSummary, Orchestrator, RateGovernor, SourceCrawler};
pub use ledger::{Checkpoint, CheckpointLedger, Counters, RecordKind};
pub use model::{Comment, Item, Page, Post, Profile, Source};
pub use storage::{RecordStore, StoreError};
