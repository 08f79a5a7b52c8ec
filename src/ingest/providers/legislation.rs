// src/ingest/providers/legislation.rs
//! Legislative feeds. Completeness matters more than recency here, so there
//! is no date or keyword filter.

use async_trait::async_trait;
use std::time::Duration;

use super::load_feed;
use crate::ingest::types::{SourceError, SourceProcessor, SourceReport};
use crate::ingest::{pace, Candidate, ItemOutcome, Pipeline, SkipReason};
use crate::model::{SourceType, Tags};
use crate::progress::ProgressTracker;

pub const LEGISLATION_TAG: &str = "legislation";

pub struct LegislationProcessor {
    sources: Vec<String>,
    delay: Duration,
}

impl LegislationProcessor {
    pub fn new(sources: Vec<String>, delay: Duration) -> Self {
        Self { sources, delay }
    }
}

#[async_trait]
impl SourceProcessor for LegislationProcessor {
    fn name(&self) -> &'static str {
        "legislation"
    }

    fn category(&self) -> &'static str {
        "legislation_feeds"
    }

    fn source_type(&self) -> SourceType {
        SourceType::LegislationFeed
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
            let outcome = match pipeline.admit(&it.link, SourceType::LegislationFeed).await {
                Some(reason) => ItemOutcome::Skipped(reason),
                None => match pipeline.extract(&it.link, progress).await {
                    None => ItemOutcome::Skipped(SkipReason::ExtractionFailed),
                    Some(body) => {
                        let text = format!("{} {} {}", it.title, it.description, body.content);
                        let tags = Tags {
                            continents: pipeline.tagger.detect_continents(&text),
                            special_tags: vec![LEGISLATION_TAG.to_string()],
                            ..Tags::default()
                        };
                        let cand = Candidate {
                            title: it.title,
                            url: it.link,
                            pub_date: it.pub_date,
                            description: it.description,
                            source_type: SourceType::LegislationFeed,
                            feed_url: source.to_string(),
                        };
                        pipeline.store(cand, body.content, tags).await
                    }
                },
            };
            report.record(outcome);
            if outcome.touched_network() {
                pace(self.delay).await;
            }
        }
        Ok(report)
    }
}
