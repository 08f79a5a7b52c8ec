// src/ingest/types.rs
use async_trait::async_trait;

use super::Pipeline;
use crate::fetch::FetchError;
use crate::model::SourceType;
use crate::progress::ProgressTracker;

/// One entry of a parsed feed, fields already entity-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub description: String,
}

/// Whole-source failure. Item-level problems never surface here.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid source {source_url}: {reason}")]
    Invalid { source_url: String, reason: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("could not parse {source_url}: {reason}")]
    Parse { source_url: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Completed,
    SkippedCompleted,
    SkippedInvalid,
    Failed,
}

impl SourceError {
    pub fn terminal_state(&self) -> SourceState {
        match self {
            SourceError::Invalid { .. } => SourceState::SkippedInvalid,
            SourceError::Fetch(_) | SourceError::Parse { .. } => SourceState::Failed,
        }
    }
}

/// Per-source counters, summed into the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceReport {
    /// Items seen in the source.
    pub fetched: usize,
    /// Items dropped by dedup, filters or failed extraction.
    pub skipped: usize,
    pub saved: usize,
    /// Items whose storage write failed.
    pub failed: usize,
}

impl std::ops::AddAssign for SourceReport {
    fn add_assign(&mut self, o: Self) {
        self.fetched += o.fetched;
        self.skipped += o.skipped;
        self.saved += o.saved;
        self.failed += o.failed;
    }
}

#[async_trait]
pub trait SourceProcessor: Send + Sync {
    /// Progress file stem, e.g. `rss_news`.
    fn name(&self) -> &'static str;
    /// Progress category key, e.g. `rss_feeds`.
    fn category(&self) -> &'static str;
    fn source_type(&self) -> SourceType;
    fn sources(&self) -> Vec<String>;

    /// Process one source; items inside it run sequentially in source order.
    async fn process_source(
        &self,
        source: &str,
        pipeline: &Pipeline,
        progress: &ProgressTracker,
    ) -> Result<SourceReport, SourceError>;
}
