//! Per-source pagination state machine
//!
//! ```text
//! Resuming → Fetching → (RateLimited | TransientError | Processing)
//!          → Persisting → CheckpointUpdate → {Fetching | Done}
//! ```
//!
//! A crawler walks one source page by page. The checkpoint only moves after
//! every record of a page has been written, so an interrupted page is simply
//! fetched and written again on the next run.

use crate::api::BatchSource;
use crate::config::{CrawlerConfig, TransientRetry};
use crate::crawler::governor::RateGovernor;
use crate::ledger::{Checkpoint, CheckpointLedger, Counters, RecordKind};
use crate::model::{process_page, ProcessedPage, Source};
use crate::storage::{keys, put_json, RecordStore, StoreResult};
use crate::{FetchError, WallcrawlError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pagination and retry settings shared by all source crawlers
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Posts requested per page
    pub page_size: u32,

    /// Pause after the remote reports its rate limit
    pub rate_limit_cooldown: Duration,

    /// Offset handling after a transport failure
    pub transient_retry: TransientRetry,

    /// Offset increment for [`TransientRetry::Nudge`]
    pub nudge_step: u64,

    /// First transient retry delay, doubled up to `transient_backoff_max`
    pub transient_backoff: Duration,
    pub transient_backoff_max: Duration,
}

impl CrawlSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            page_size: config.page_size,
            rate_limit_cooldown: config.rate_limit_cooldown(),
            transient_retry: config.transient_retry,
            nudge_step: config.nudge_step,
            transient_backoff: Duration::from_millis(config.transient_backoff_ms),
            transient_backoff_max: Duration::from_millis(config.transient_backoff_max_ms),
        }
    }
}

/// States of the pagination state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Resuming,
    Fetching,
    RateLimited,
    TransientError,
    Processing,
    Persisting,
    CheckpointUpdate,
    Done,
    Cancelled,
    Failed,
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resuming => "resuming",
            Self::Fetching => "fetching",
            Self::RateLimited => "rate_limited",
            Self::TransientError => "transient_error",
            Self::Processing => "processing",
            Self::Persisting => "persisting",
            Self::CheckpointUpdate => "checkpoint_update",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a crawler that did not fail came to a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The whole feed has been persisted
    Done,

    /// Shutdown was requested; the in-flight page was abandoned
    Cancelled,
}

/// What one crawler did during this run
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source: Source,
    pub outcome: CrawlOutcome,

    /// Pages persisted and checkpointed
    pub pages: u64,

    /// Last durable checkpoint
    pub checkpoint: Checkpoint,

    /// Records newly created in the store
    pub created: Counters,
}

/// Crawls a single source until its feed is exhausted
pub struct SourceCrawler {
    source: Source,
    batches: Arc<dyn BatchSource>,
    governor: Arc<RateGovernor>,
    ledger: Arc<CheckpointLedger>,
    store: Arc<dyn RecordStore>,
    settings: CrawlSettings,
    shutdown: CancellationToken,
}

impl SourceCrawler {
    pub fn new(
        source: Source,
        batches: Arc<dyn BatchSource>,
        governor: Arc<RateGovernor>,
        ledger: Arc<CheckpointLedger>,
        store: Arc<dyn RecordStore>,
        settings: CrawlSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            batches,
            governor,
            ledger,
            store,
            settings,
            shutdown,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    fn enter(&self, state: SourceState, offset: u64) {
        tracing::trace!(source = %self.source.id, offset, %state, "state transition");
    }

    /// Sleeps for `delay`; returns false if shutdown fired first
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Runs the state machine to completion
    ///
    /// # Returns
    ///
    /// * `Ok(SourceReport)` - The feed was exhausted or shutdown was observed
    /// * `Err(WallcrawlError::Fetch)` - The remote reported a fatal error
    /// * `Err(WallcrawlError::Storage | Ledger)` - A page could not be made
    ///   durable; its checkpoint was not advanced
    pub async fn run(self) -> Result<SourceReport, WallcrawlError> {
        self.enter(SourceState::Resuming, 0);
        let mut checkpoint = self.ledger.checkpoint(&self.source.id).unwrap_or_default();
        let mut offset = checkpoint.offset;
        let mut pages = 0u64;
        let mut created = Counters::default();
        let mut backoff = self.settings.transient_backoff;

        tracing::info!(
            "Starting source {} from offset {} (last known total {})",
            self.source,
            offset,
            checkpoint.total
        );

        let report = |outcome, pages, checkpoint, created| SourceReport {
            source: self.source.clone(),
            outcome,
            pages,
            checkpoint,
            created,
        };

        loop {
            self.enter(SourceState::Fetching, offset);
            if self
                .governor
                .acquire_cancellable(&self.shutdown)
                .await
                .is_none()
            {
                self.enter(SourceState::Cancelled, offset);
                return Ok(report(CrawlOutcome::Cancelled, pages, checkpoint, created));
            }

            let fetched = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.enter(SourceState::Cancelled, offset);
                    return Ok(report(CrawlOutcome::Cancelled, pages, checkpoint, created));
                }
                fetched = self.batches.fetch(&self.source, offset, self.settings.page_size) => fetched,
            };

            let page = match fetched {
                Ok(page) => {
                    backoff = self.settings.transient_backoff;
                    page
                }
                Err(FetchError::RateLimited { code, message }) => {
                    self.enter(SourceState::RateLimited, offset);
                    tracing::warn!(
                        "Source {}: rate limited (code {}: {}), cooling down for {:?}",
                        self.source.id,
                        code,
                        message,
                        self.settings.rate_limit_cooldown
                    );
                    if !self.pause(self.settings.rate_limit_cooldown).await {
                        return Ok(report(CrawlOutcome::Cancelled, pages, checkpoint, created));
                    }
                    continue;
                }
                Err(FetchError::Transient(reason)) => {
                    self.enter(SourceState::TransientError, offset);
                    if self.settings.transient_retry == TransientRetry::Nudge {
                        offset += self.settings.nudge_step;
                    }
                    tracing::warn!(
                        "Source {}: {}; retrying at offset {} in {:?}",
                        self.source.id,
                        reason,
                        offset,
                        backoff
                    );
                    if !self.pause(backoff).await {
                        return Ok(report(CrawlOutcome::Cancelled, pages, checkpoint, created));
                    }
                    backoff = (backoff * 2).min(self.settings.transient_backoff_max);
                    continue;
                }
                Err(fatal @ FetchError::Fatal { .. }) => {
                    self.enter(SourceState::Failed, offset);
                    tracing::error!("Source {} stopped: {}", self.source, fatal);
                    return Err(fatal.into());
                }
            };

            self.enter(SourceState::Processing, offset);
            let fetched_posts = page.posts.len() as u64;
            let total = page.total_count;
            let processed = process_page(page, &self.source);

            self.enter(SourceState::Persisting, offset);
            if let Err(e) = self.persist(&processed, &mut created).await {
                self.enter(SourceState::Failed, offset);
                tracing::error!(
                    "Source {}: failed to persist page at offset {}: {}",
                    self.source,
                    offset,
                    e
                );
                return Err(e.into());
            }

            self.enter(SourceState::CheckpointUpdate, offset);
            let next = Checkpoint::new(offset + fetched_posts, total);
            if let Err(e) = self.ledger.commit_page(&self.source.id, next).await {
                self.enter(SourceState::Failed, offset);
                tracing::error!(
                    "Source {}: failed to checkpoint offset {}: {}",
                    self.source,
                    next.offset,
                    e
                );
                return Err(e.into());
            }
            offset = next.offset;
            checkpoint = next;
            pages += 1;

            tracing::info!(
                "Source {}: next offset {}/{} ({:.1}%), {} records written",
                self.source.id,
                offset,
                total,
                checkpoint.percent(),
                processed.record_count()
            );
            tracing::debug!("Totals: {}", self.ledger.counters());

            if offset >= total {
                self.enter(SourceState::Done, offset);
                tracing::info!("Finished source {}: {}/{} posts", self.source, offset, total);
                return Ok(report(CrawlOutcome::Done, pages, checkpoint, created));
            }

            if fetched_posts == 0 {
                self.enter(SourceState::Done, offset);
                tracing::warn!(
                    "Source {}: empty page at offset {} although {} posts are reported; stopping",
                    self.source,
                    offset,
                    total
                );
                return Ok(report(CrawlOutcome::Done, pages, checkpoint, created));
            }
        }
    }

    /// Writes every qualifying record of a page
    ///
    /// Counters move only for keys the store did not have yet.
    async fn persist(&self, page: &ProcessedPage, created: &mut Counters) -> StoreResult<()> {
        let store = self.store.as_ref();
        let source_id = self.source.id.as_str();

        for post in &page.posts {
            let key = keys::post_key(source_id, &post.id.to_string());
            if put_json(store, &key, post).await?.is_created() {
                self.ledger.record_persisted(RecordKind::Post);
                created.posts += 1;
            }
        }

        for comment in &page.comments {
            let key = keys::comment_key(source_id, &comment.post_id, comment.id);
            if put_json(store, &key, comment).await?.is_created() {
                self.ledger.record_persisted(RecordKind::Comment);
                created.comments += 1;
            }
        }

        for profile in &page.profiles {
            let key = keys::profile_key(profile.id);
            if put_json(store, &key, profile).await?.is_created() {
                self.ledger.record_persisted(RecordKind::Profile);
                created.profiles += 1;
            }
        }

        Ok(())
    }
}
