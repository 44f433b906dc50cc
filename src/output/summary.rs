//! End-of-run summary

use crate::ledger::{Checkpoint, Counters};
use crate::model::Source;
use chrono::{DateTime, Utc};
use std::fmt;

/// How one source ended in this run
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// Feed exhausted
    Done(Checkpoint),

    /// Stopped at shutdown; resumes from the checkpoint next run
    Cancelled(Checkpoint),

    /// Stopped on an error; resumes from its last checkpoint next run
    Failed(String),

    /// The worker was aborted after the shutdown grace period, or panicked
    Aborted,
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(c) => write!(f, "done at {}/{}", c.offset, c.total),
            Self::Cancelled(c) => write!(f, "cancelled at {}/{}", c.offset, c.total),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub source: Source,
    pub outcome: SourceOutcome,
}

/// Result of a whole crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// One entry per resolved source, in resolution order
    pub sources: Vec<SourceSummary>,

    /// Counters after the final flush
    pub counters: Counters,

    /// True if shutdown was requested before every source finished
    pub interrupted: bool,
}

impl CrawlSummary {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Counts sources whose outcome satisfies `predicate`
    pub fn count_where(&self, predicate: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.sources.iter().filter(|s| predicate(&s.outcome)).count()
    }

    pub fn failed(&self) -> usize {
        self.count_where(|o| matches!(o, SourceOutcome::Failed(_)))
    }

    pub fn done(&self) -> usize {
        self.count_where(|o| matches!(o, SourceOutcome::Done(_)))
    }
}

/// Logs the summary, one line per source and a closing total
pub fn log_summary(summary: &CrawlSummary) {
    for entry in &summary.sources {
        match entry.outcome {
            SourceOutcome::Failed(_) | SourceOutcome::Aborted => {
                tracing::warn!("{}: {}", entry.source, entry.outcome)
            }
            _ => tracing::info!("{}: {}", entry.source, entry.outcome),
        }
    }

    tracing::info!(
        "Crawl {} after {}s: {} of {} sources done, {} failed; {}",
        if summary.interrupted {
            "interrupted"
        } else {
            "finished"
        },
        summary.duration_seconds(),
        summary.done(),
        summary.sources.len(),
        summary.failed(),
        summary.counters
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_summary_counts() {
        let started_at = Utc::now();
        let summary = CrawlSummary {
            started_at,
            finished_at: started_at + Duration::seconds(90),
            sources: vec![
                SourceSummary {
                    source: Source::new("-1", "one"),
                    outcome: SourceOutcome::Done(Checkpoint::new(5, 5)),
                },
                SourceSummary {
                    source: Source::new("-2", "two"),
                    outcome: SourceOutcome::Failed("remote error 15: Access denied".to_string()),
                },
                SourceSummary {
                    source: Source::new("-3", "three"),
                    outcome: SourceOutcome::Cancelled(Checkpoint::new(2, 9)),
                },
            ],
            counters: Counters::default(),
            interrupted: true,
        };

        assert_eq!(summary.duration_seconds(), 90);
        assert_eq!(summary.done(), 1);
        assert_eq!(summary.failed(), 1);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            SourceOutcome::Cancelled(Checkpoint::new(2, 9)).to_string(),
            "cancelled at 2/9"
        );
        assert_eq!(SourceOutcome::Aborted.to_string(), "aborted");
    }
}
