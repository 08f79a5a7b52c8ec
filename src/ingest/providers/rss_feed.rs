// src/ingest/providers/rss_feed.rs
//! News feeds: recent, keyword-relevant items only.

use async_trait::async_trait;
use std::time::Duration;

use super::load_feed;
use crate::ingest::types::{FeedEntry, SourceError, SourceProcessor, SourceReport};
use crate::ingest::{pace, Candidate, DatePolicy, ItemOutcome, Pipeline, SkipReason};
use crate::model::SourceType;
use crate::progress::ProgressTracker;
use crate::tagger::KeywordSet;

pub struct RssNewsProcessor {
    sources: Vec<String>,
    keywords: KeywordSet,
    dates: DatePolicy,
    delay: Duration,
}

impl RssNewsProcessor {
    pub fn new(sources: Vec<String>, keywords: KeywordSet, min_year: i32, delay: Duration) -> Self {
        Self {
            sources,
            keywords,
            dates: DatePolicy::YearAtLeast(min_year),
            delay,
        }
    }

    async fn process_entry(
        &self,
        feed_url: &str,
        it: FeedEntry,
        pipeline: &Pipeline,
        progress: &ProgressTracker,
    ) -> ItemOutcome {
        if let Some(reason) = pipeline.admit(&it.link, SourceType::RssFeed).await {
            return ItemOutcome::Skipped(reason);
        }
        if !self.dates.admits(&it.pub_date) {
            tracing::debug!(target: "ingest", url = %it.link, date = %it.pub_date, "too old");
            return ItemOutcome::Skipped(SkipReason::TooOld);
        }
        // Relevance is decided on the cheap fields before paying for the page.
        if !self.keywords.is_match(&format!("{} {}", it.title, it.description)) {
            return ItemOutcome::Skipped(SkipReason::NotRelevant);
        }
        let Some(body) = pipeline.extract(&it.link, progress).await else {
            return ItemOutcome::Skipped(SkipReason::ExtractionFailed);
        };

        let text = format!("{} {} {}", it.title, it.description, body.content);
        let tags = pipeline.full_tags(&text, &self.keywords);
        let cand = Candidate {
            title: it.title,
            url: it.link,
            pub_date: it.pub_date,
            description: it.description,
            source_type: SourceType::RssFeed,
            feed_url: feed_url.to_string(),
        };
        pipeline.store(cand, body.content, tags).await
    }
}

#[async_trait]
impl SourceProcessor for RssNewsProcessor {
    fn name(&self) -> &'static str {
        "rss_news"
    }

    fn category(&self) -> &'static str {
        "rss_feeds"
    }

    fn source_type(&self) -> SourceType {
        SourceType::RssFeed
    }

    fn sources(&self) -> Vec<String> {
        self.sources.clone()
    }

    async fn process_source(
        &self,
        source: &str,
        pipeline: &Pipeline,
        progress: &ProgressTracker,
    ) -> Result<SourceReport, SourceError> {
        let entries = load_feed(pipeline.http.as_ref(), source).await?;
        let mut report = SourceReport {
            fetched: entries.len(),
            ..SourceReport::default()
        };
        for it in entries {
            let outcome = self.process_entry(source, it, pipeline, progress).await;
            report.record(outcome);
            if outcome.touched_network() {
                pace(self.delay).await;
            }
        }
        Ok(report)
    }
}
