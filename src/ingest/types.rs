// src/ingest/types.rs
use anyhow::Result;

use crate::news::NewsItem;

/// A pull-based news source producing draft items.
///
/// Errors are reported to the caller; `ingest::fetch_all` is what turns them
/// into an empty result so one broken source never blocks the rest.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    /// Label used in logs and metrics.
    fn name(&self) -> &str;
}
