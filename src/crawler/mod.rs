//! Crawler module for walking source feeds
//!
//! This module contains the core crawling logic, including:
//! - Global request spacing shared by every worker
//! - The per-source pagination state machine
//! - Orchestration of all workers, flushing and shutdown

mod governor;
mod orchestrator;
mod source;

pub use governor::RateGovernor;
pub use orchestrator::Orchestrator;
pub use source::{CrawlOutcome, CrawlSettings, SourceCrawler, SourceReport, SourceState};

pub use crate::output::CrawlSummary;
