//! Configuration module for Wallcrawl
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus the two side inputs a crawl needs: the access token and the
//! list of source names.
//!
//! # Example
//!
//! ```no_run
//! use wallcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("wallcrawl.toml")).unwrap();
//! println!("Page size: {}", config.crawler.page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, CrawlerConfig, InputConfig, OutputConfig, StoreBackend, TransientRetry,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_access_token, load_config, load_config_with_hash, load_sources,
    parse_sources,
};
