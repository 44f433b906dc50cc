//! Crawl orchestration
//!
//! The orchestrator owns the shared pieces of a run (governor, ledger, store,
//! shutdown token), resolves the configured names into sources, runs one
//! `SourceCrawler` task per source and makes sure the counters are flushed
//! however the run ends.

use crate::api::{BatchSource, SourceResolver};
use crate::config::CrawlerConfig;
use crate::crawler::governor::RateGovernor;
use crate::crawler::source::{CrawlOutcome, CrawlSettings, SourceCrawler, SourceReport};
use crate::ledger::CheckpointLedger;
use crate::model::Source;
use crate::output::{log_progress_report, CrawlStatistics, CrawlSummary, SourceOutcome, SourceSummary};
use crate::storage::RecordStore;
use crate::{FetchError, Result, WallcrawlError};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How often source resolution is attempted before giving up
const RESOLVE_ATTEMPTS: u32 = 5;

type WorkerResult = std::result::Result<(Source, Result<SourceReport>), JoinError>;

/// Runs all source crawlers of one process
pub struct Orchestrator {
    resolver: Arc<dyn SourceResolver>,
    batches: Arc<dyn BatchSource>,
    store: Arc<dyn RecordStore>,
    ledger: Arc<CheckpointLedger>,
    governor: Arc<RateGovernor>,
    settings: CrawlSettings,
    flush_interval: Duration,
    shutdown_grace: Duration,
    shutdown: CancellationToken,
}

impl Orchestrator {
    /// Creates an orchestrator from the crawler configuration
    pub fn new(
        config: &CrawlerConfig,
        resolver: Arc<dyn SourceResolver>,
        batches: Arc<dyn BatchSource>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            resolver,
            batches,
            ledger: Arc::new(CheckpointLedger::new(Arc::clone(&store))),
            store,
            governor: Arc::new(RateGovernor::new(config.request_interval())),
            settings: CrawlSettings::from_config(config),
            flush_interval: config.flush_interval(),
            shutdown_grace: config.shutdown_grace(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replaces the pagination and retry settings
    pub fn with_settings(mut self, settings: CrawlSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn ledger(&self) -> &Arc<CheckpointLedger> {
        &self.ledger
    }

    /// Loads prior state, resolves `names` and crawls every source
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - All workers finished, failed or were stopped
    /// * `Err(WallcrawlError)` - Startup failed (ledger load, resolution) or
    ///   the final flush could not be written
    pub async fn run(&self, names: &[String]) -> Result<CrawlSummary> {
        let started_at = Utc::now();

        self.ledger.load_all().await?;
        log_progress_report(&CrawlStatistics::from_ledger(&self.ledger));

        match self.resolve_sources(names).await? {
            Some(sources) => self.crawl_sources(sources, started_at).await,
            None => {
                tracing::info!("Shutdown requested before sources were resolved");
                let counters = self.ledger.flush().await?;
                Ok(CrawlSummary {
                    started_at,
                    finished_at: Utc::now(),
                    sources: Vec::new(),
                    counters,
                    interrupted: true,
                })
            }
        }
    }

    /// Resolves screen names into sources with bounded retries
    ///
    /// Rate limits and transient failures are retried; any other remote error
    /// aborts startup. Returns `Ok(None)` if shutdown fires meanwhile.
    pub async fn resolve_sources(&self, names: &[String]) -> Result<Option<Vec<Source>>> {
        if names.is_empty() {
            return Err(WallcrawlError::Resolve("no sources configured".to_string()));
        }

        let mut backoff = self.settings.transient_backoff;
        let mut last_error = None;

        for attempt in 1..=RESOLVE_ATTEMPTS {
            if self
                .governor
                .acquire_cancellable(&self.shutdown)
                .await
                .is_none()
            {
                return Ok(None);
            }

            let resolved = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(None),
                resolved = self.resolver.resolve(names) => resolved,
            };

            let error = match resolved {
                Ok(sources) => return resolved_sources(names, sources).map(Some),
                Err(error) if !error.is_retryable() => return Err(error.into()),
                Err(error) => error,
            };

            let delay = match error {
                FetchError::RateLimited { .. } => self.settings.rate_limit_cooldown,
                _ => {
                    let delay = backoff;
                    backoff = (backoff * 2).min(self.settings.transient_backoff_max);
                    delay
                }
            };

            tracing::warn!(
                "Resolving sources failed (attempt {}/{}): {}; retrying in {:?}",
                attempt,
                RESOLVE_ATTEMPTS,
                error,
                delay
            );
            last_error = Some(error);

            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Err(WallcrawlError::Resolve(format!(
            "gave up after {} attempts: {}",
            RESOLVE_ATTEMPTS,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Crawls already resolved sources until each is done, failed or stopped
    pub async fn crawl_sources(
        &self,
        sources: Vec<Source>,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<CrawlSummary> {
        tracing::info!("Crawling {} sources", sources.len());

        let mut tasks = JoinSet::new();
        for source in &sources {
            let crawler = SourceCrawler::new(
                source.clone(),
                Arc::clone(&self.batches),
                Arc::clone(&self.governor),
                Arc::clone(&self.ledger),
                Arc::clone(&self.store),
                self.settings.clone(),
                self.shutdown.child_token(),
            );
            tasks.spawn(async move {
                let source = crawler.source().clone();
                let result = crawler.run().await;
                (source, result)
            });
        }

        let flush_stop = CancellationToken::new();
        let flusher = tokio::spawn(periodic_flush(
            Arc::clone(&self.ledger),
            self.flush_interval,
            flush_stop.clone(),
        ));

        let mut outcomes = HashMap::new();
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => self.record(joined, &mut outcomes).await,
                    None => break,
                },
                _ = self.shutdown.cancelled(), if deadline.is_none() => {
                    tracing::info!(
                        "Shutdown requested; waiting up to {:?} for {} workers",
                        self.shutdown_grace,
                        tasks.len()
                    );
                    deadline = Some(Instant::now() + self.shutdown_grace);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    tracing::warn!("Aborting {} workers that did not stop in time", tasks.len());
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next().await {
                        self.record(joined, &mut outcomes).await;
                    }
                    break;
                }
            }
        }

        flush_stop.cancel();
        if let Err(e) = flusher.await {
            tracing::warn!("Periodic flush task failed: {}", e);
        }
        let counters = self.ledger.flush().await?;

        let sources = sources
            .into_iter()
            .map(|source| {
                let outcome = outcomes
                    .remove(&source.id)
                    .unwrap_or(SourceOutcome::Aborted);
                SourceSummary { source, outcome }
            })
            .collect();

        Ok(CrawlSummary {
            started_at,
            finished_at: Utc::now(),
            sources,
            counters,
            interrupted: deadline.is_some() || self.shutdown.is_cancelled(),
        })
    }

    /// Records a finished worker and flushes the counters
    async fn record(&self, joined: WorkerResult, outcomes: &mut HashMap<String, SourceOutcome>) {
        match joined {
            Ok((source, Ok(report))) => {
                let outcome = match report.outcome {
                    CrawlOutcome::Done => SourceOutcome::Done(report.checkpoint),
                    CrawlOutcome::Cancelled => SourceOutcome::Cancelled(report.checkpoint),
                };
                tracing::info!(
                    "Source {} {} after {} pages (new {})",
                    source,
                    outcome,
                    report.pages,
                    report.created
                );
                outcomes.insert(source.id, outcome);
            }
            Ok((source, Err(e))) => {
                tracing::error!("Source {} failed: {}", source, e);
                outcomes.insert(source.id, SourceOutcome::Failed(e.to_string()));
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Worker aborted");
            }
            Err(e) => {
                tracing::error!("Worker task panicked: {}", e);
            }
        }

        if let Err(e) = self.ledger.flush().await {
            tracing::warn!("Failed to flush counters: {}", e);
        }
    }
}

/// Keeps the first source per id and warns about names that did not resolve
fn resolved_sources(names: &[String], sources: Vec<Source>) -> Result<Vec<Source>> {
    let mut seen = HashSet::new();
    let sources: Vec<Source> = sources
        .into_iter()
        .filter(|source| seen.insert(source.id.clone()))
        .collect();

    for name in names {
        if !sources.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
            tracing::warn!("Source {} could not be resolved; skipping it", name);
        }
    }

    if sources.is_empty() {
        return Err(WallcrawlError::Resolve(format!(
            "none of the {} configured sources exist",
            names.len()
        )));
    }
    Ok(sources)
}

async fn periodic_flush(ledger: Arc<CheckpointLedger>, every: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => match ledger.flush().await {
                Ok(counters) => tracing::debug!("Periodic flush ({})", counters),
                Err(e) => tracing::warn!("Periodic flush failed: {}", e),
            },
        }
    }
}
