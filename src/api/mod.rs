//! Remote API access
//!
//! The crawler only sees the two traits defined here; `VkClient` is the
//! production implementation and tests substitute scripted fakes.

mod client;
pub mod wire;

pub use client::{build_http_client, VkClient};

use crate::model::{Page, Source};
use crate::FetchError;
use async_trait::async_trait;

/// Paginated feed of one source
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Fetches up to `page_size` posts starting at `offset`, with their
    /// comments and comment authors
    async fn fetch(&self, source: &Source, offset: u64, page_size: u32) -> Result<Page, FetchError>;
}

/// Turns configured screen names into canonical sources
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolves all `names` in one call; unknown names are left out
    async fn resolve(&self, names: &[String]) -> Result<Vec<Source>, FetchError>;
}
