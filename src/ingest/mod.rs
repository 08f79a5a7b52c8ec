// src/ingest/mod.rs
pub mod feed;
pub mod providers;
pub mod types;

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::sync::Arc;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::extract::{Extracted, ExtractionFailure, Extractor, Strategy};
use crate::fetch::{log_fetch_failure, HttpFetch};
use crate::model::{ArticleRecord, SourceType, Tags};
use crate::progress::ProgressTracker;
use crate::storage::writer::{SaveOutcome, StorageWriter};
use crate::storage::StorageLayout;
use crate::tagger::{KeywordSet, Tagger};

/// One-time metrics registration so series exist before the first event.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collector_items_total", "Items parsed from sources.");
        describe_counter!("collector_saved_total", "Articles written to the object store.");
        describe_counter!(
            "collector_skipped_total",
            "Items skipped, labelled by reason."
        );
        describe_counter!(
            "collector_extraction_failures_total",
            "Article bodies that could not be extracted."
        );
        describe_counter!(
            "collector_source_errors_total",
            "Sources that failed or were invalid."
        );
        describe_counter!(
            "collector_write_failures_total",
            "Object store writes that failed."
        );
        describe_histogram!("collector_extract_ms", "Extraction time in milliseconds.");
        describe_histogram!("collector_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("collector_last_run_ts", "Unix ts when a collection run finished.");
    });
}

/// Normalize feed text: decode entities, strip tags, ASCII quotes, collapse
/// whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap());
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

    // Tags first: escaped markup in a description decodes into literal text.
    let out = RE_TAGS.replace_all(s, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Publication-date admission rule for a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePolicy {
    /// Keep items from this year on. Undated or unparseable items are kept.
    YearAtLeast(i32),
    Any,
}

fn publication_year(s: &str) -> Option<i32> {
    static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return Some(dt.year());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.year());
    }
    RE_YEAR.find(s).and_then(|m| m.as_str().parse().ok())
}

impl DatePolicy {
    pub fn admits(&self, pub_date: &str) -> bool {
        match self {
            DatePolicy::Any => true,
            DatePolicy::YearAtLeast(min) => publication_year(pub_date).is_none_or(|y| y >= *min),
        }
    }
}

/// Why an item did not produce a new article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingLink,
    Duplicate,
    AlreadyStored,
    TooOld,
    NotRelevant,
    ExtractionFailed,
    Unreachable,
    AlreadyExists,
    /// Another worker was writing the same article.
    InFlight,
    NotPolitical,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingLink => "missing_link",
            SkipReason::Duplicate => "duplicate",
            SkipReason::AlreadyStored => "already_stored",
            SkipReason::TooOld => "too_old",
            SkipReason::NotRelevant => "not_relevant",
            SkipReason::ExtractionFailed => "extraction_failed",
            SkipReason::Unreachable => "unreachable",
            SkipReason::AlreadyExists => "already_exists",
            SkipReason::InFlight => "in_flight",
            SkipReason::NotPolitical => "not_political",
        }
    }

    /// Decided before the item's page was requested.
    pub fn before_fetch(self) -> bool {
        !matches!(
            self,
            SkipReason::ExtractionFailed
                | SkipReason::Unreachable
                | SkipReason::AlreadyExists
                | SkipReason::InFlight
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Saved,
    Skipped(SkipReason),
    WriteFailed,
}

impl ItemOutcome {
    /// Whether the item cost a request to its site, so the rate delay applies.
    pub fn touched_network(self) -> bool {
        !matches!(self, ItemOutcome::Skipped(r) if r.before_fetch())
    }
}

/// Per-site politeness delay between items of one source.
pub async fn pace(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl types::SourceReport {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Saved => self.saved += 1,
            ItemOutcome::Skipped(reason) => {
                self.skipped += 1;
                counter!("collector_skipped_total", "reason" => reason.as_str()).increment(1);
            }
            ItemOutcome::WriteFailed => self.failed += 1,
        }
    }
}

/// Everything an item needs after admission, before it becomes a record.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    pub pub_date: String,
    pub description: String,
    pub source_type: SourceType,
    pub feed_url: String,
}

/// Shared per-item machinery: dedup admission, extraction, tagging, storage.
pub struct Pipeline {
    pub http: Arc<dyn HttpFetch>,
    pub extractor: Extractor,
    pub tagger: Arc<Tagger>,
    pub writer: Arc<StorageWriter>,
    pub layout: StorageLayout,
    pub collected_at: DateTime<Utc>,
}

impl Pipeline {
    /// Cheap checks that run before any network fetch of the item: the URL
    /// set first, then the article's keys in the store.
    pub async fn admit(&self, url: &str, kind: SourceType) -> Option<SkipReason> {
        if url.trim().is_empty() {
            return Some(SkipReason::MissingLink);
        }
        if self.writer.manifest().already_processed(url) {
            tracing::debug!(target: "ingest", %url, "already processed");
            return Some(SkipReason::Duplicate);
        }
        if self.writer.article_stored(&self.layout, kind, url).await {
            tracing::debug!(target: "ingest", %url, "already stored, caching url");
            self.writer.manifest().mark_processed(url);
            return Some(SkipReason::AlreadyStored);
        }
        None
    }

    /// Extract and record the attempt in the progress stats.
    pub async fn extract(&self, url: &str, progress: &ProgressTracker) -> Option<Extracted> {
        let res = self.extractor.extract(url).await;
        self.note_extraction(url, res, progress)
    }

    /// Extraction for a page the processor already fetched.
    pub async fn extract_fetched(&self, url: &str, html: &str, progress: &ProgressTracker) -> Option<Extracted> {
        let res = self.extractor.extract_fetched(url, html).await;
        self.note_extraction(url, res, progress)
    }

    fn note_extraction(
        &self,
        url: &str,
        res: Result<Extracted, ExtractionFailure>,
        progress: &ProgressTracker,
    ) -> Option<Extracted> {
        let stat = match &res {
            Ok(x) => progress.record_extraction_success(x.strategy == Strategy::SiteSpecific),
            Err(_) => progress.record_extraction_failure(),
        };
        if let Err(e) = stat {
            tracing::warn!(target: "ingest", error = ?e, "could not persist extraction stats");
        }
        match res {
            Ok(x) => Some(x),
            Err(ExtractionFailure::Fetch(e)) => {
                counter!("collector_extraction_failures_total").increment(1);
                log_fetch_failure(&e, "article");
                None
            }
            Err(e) => {
                counter!("collector_extraction_failures_total").increment(1);
                tracing::warn!(target: "ingest", %url, error = %e, "content extraction failed");
                None
            }
        }
    }

    /// Write the article and mark its URL processed. A failed write, or one
    /// still in another worker's hands, leaves the URL unmarked.
    pub async fn store(&self, cand: Candidate, content: String, tags: Tags) -> ItemOutcome {
        let rec = ArticleRecord {
            title: cand.title,
            url: cand.url,
            pub_date: cand.pub_date,
            description: cand.description,
            content,
            source_type: cand.source_type,
            feed_url: cand.feed_url,
            collection_date: self.collected_at,
            tags,
        };
        match self.writer.save_article(&self.layout, &rec).await {
            Ok(SaveOutcome::InFlight) => {
                tracing::debug!(target: "storage", url = %rec.url, "article being written by another worker");
                ItemOutcome::Skipped(SkipReason::InFlight)
            }
            Ok(SaveOutcome::AlreadyExists) => {
                self.writer.manifest().mark_processed(&rec.url);
                ItemOutcome::Skipped(SkipReason::AlreadyExists)
            }
            Ok(outcome) => {
                self.writer.manifest().mark_processed(&rec.url);
                counter!("collector_saved_total").increment(1);
                tracing::info!(target: "ingest", url = %rec.url, title = %preview(&rec.title), ?outcome, "saved");
                ItemOutcome::Saved
            }
            Err(e) => {
                tracing::error!(target: "storage", url = %rec.url, error = ?e, "storage write failed");
                ItemOutcome::WriteFailed
            }
        }
    }

    /// Full tags: continents, keywords and topics from `text`.
    pub fn full_tags(&self, text: &str, universe: &KeywordSet) -> Tags {
        let c = self.tagger.classify(text, universe);
        Tags {
            continents: c.continents,
            matched_keywords: c.matched_keywords,
            core_topics: c.core_topics,
            ..Tags::default()
        }
    }
}

/// First 60 chars, for log lines.
pub fn preview(s: &str) -> String {
    s.chars().take(60).collect()
}

/// Validates a source URL: absolute http(s).
pub fn parse_source_url(source: &str) -> Result<url::Url, types::SourceError> {
    let invalid = |reason: String| types::SourceError::Invalid {
        source_url: source.to_string(),
        reason,
    };
    let u = url::Url::parse(source.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(u.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", u.scheme())));
    }
    Ok(u)
}

pub(crate) fn keyword_set(terms: &[String]) -> Result<KeywordSet> {
    KeywordSet::new(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_decodes_and_collapses() {
        let s = "  <b>Hello</b>,&nbsp;&nbsp; &ldquo;world&rdquo;!  ";
        assert_eq!(normalize_text(s), "Hello , \"world\"!");
        assert_eq!(normalize_text("a &lt;b&gt; c"), "a <b> c");
        assert_eq!(normalize_text("fish & chips < 5"), "fish & chips < 5");
    }

    #[test]
    fn year_policy() {
        let p = DatePolicy::YearAtLeast(2025);
        assert!(p.admits("Mon, 06 Jan 2025 10:00:00 GMT"));
        assert!(!p.admits("Fri, 06 Dec 2024 10:00:00 +0000"));
        assert!(p.admits("2026-02-01T00:00:00Z"));
        assert!(!p.admits("2023-02-01T00:00:00+01:00"));
        assert!(!p.admits("posted March 2019"));
        // undated and unparseable pass
        assert!(p.admits(""));
        assert!(p.admits("yesterday"));
        assert!(DatePolicy::Any.admits("1999-01-01T00:00:00Z"));
    }

    fn pipeline(writer: Arc<StorageWriter>) -> Pipeline {
        let http: Arc<dyn HttpFetch> = Arc::new(crate::fetch::FixtureFetcher::new());
        Pipeline {
            http: http.clone(),
            extractor: Extractor::new(http, "https://archive.test"),
            tagger: Arc::new(Tagger::new(&crate::tagger::TaggingTables::default()).unwrap()),
            writer,
            layout: StorageLayout::new("news", chrono::NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()),
            collected_at: Utc::now(),
        }
    }

    fn candidate(url: &str) -> Candidate {
        Candidate {
            title: "Grid upgrade".into(),
            url: url.into(),
            pub_date: String::new(),
            description: String::new(),
            source_type: SourceType::RssFeed,
            feed_url: "https://news.test/rss".into(),
        }
    }

    #[tokio::test]
    async fn url_stays_open_while_another_worker_writes() {
        use crate::storage::{article_id, manifest::Manifest, MemoryStore};

        let store = Arc::new(MemoryStore::new());
        let writer = Arc::new(StorageWriter::new(store, Arc::new(Manifest::new()), false));
        let p = pipeline(writer.clone());
        let url = "https://news.test/grid";
        let content_key = p.layout.content_key(SourceType::RssFeed, &article_id(url));
        assert!(writer.manifest().try_claim(&content_key));

        let out = p.store(candidate(url), "<p>body</p>".into(), Tags::default()).await;
        assert_eq!(out, ItemOutcome::Skipped(SkipReason::InFlight));
        assert!(!writer.manifest().already_processed(url));

        writer.manifest().release(&content_key);
        let out = p.store(candidate(url), "<p>body</p>".into(), Tags::default()).await;
        assert_eq!(out, ItemOutcome::Saved);
        assert!(writer.manifest().already_processed(url));
    }

    #[test]
    fn source_urls_must_be_http() {
        assert!(parse_source_url("https://a.test/rss").is_ok());
        assert!(matches!(
            parse_source_url("ftp://a.test/rss"),
            Err(types::SourceError::Invalid { .. })
        ));
        assert!(parse_source_url("not a url").is_err());
    }
}
