// src/ingest/providers/mod.rs
pub mod direct_scrape;
pub mod legislation;
pub mod polymarket;
pub mod rss_feed;

pub use direct_scrape::DirectScrapeProcessor;
pub use legislation::LegislationProcessor;
pub use polymarket::PolymarketProcessor;
pub use rss_feed::RssNewsProcessor;

use super::feed::parse_feed;
use super::parse_source_url;
use super::types::{FeedEntry, SourceError};
use crate::fetch::HttpFetch;

/// Validate, fetch and parse one feed. Every failure is whole-source.
pub(crate) async fn load_feed(http: &dyn HttpFetch, source: &str) -> Result<Vec<FeedEntry>, SourceError> {
    parse_source_url(source)?;
    let page = http.get(source.trim()).await?;
    let entries = parse_feed(&page.body).map_err(|reason| SourceError::Parse {
        source_url: source.to_string(),
        reason,
    })?;
    tracing::info!(target: "ingest", feed = %source, entries = entries.len(), "feed loaded");
    Ok(entries)
}
