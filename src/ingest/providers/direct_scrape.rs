// src/ingest/providers/direct_scrape.rs
//! Landing-page scraping for sites without a usable feed.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

use crate::fetch::log_fetch_failure;
use crate::ingest::types::{SourceError, SourceProcessor, SourceReport};
use crate::ingest::{normalize_text, pace, parse_source_url, Candidate, DatePolicy, ItemOutcome, Pipeline, SkipReason};
use crate::model::SourceType;
use crate::progress::ProgressTracker;
use crate::tagger::KeywordSet;

/// Tried in order; links keep their discovery order.
const LINK_SELECTORS: &[&str] = &[
    r#"a[href*="/article/"]"#,
    r#"a[href*="/news/"]"#,
    r#"a[href*="/story/"]"#,
    r#"a[href*="/post/"]"#,
    r#"a[href*="/blog/"]"#,
    ".article-link a",
    ".story-link a",
    ".headline a",
    "h1 a",
    "h2 a",
    "h3 a",
];

const DATE_SELECTORS: &[&str] = &["[datetime]", ".publish-date", ".article-date", ".post-date", "time"];

const MIN_LINK_LEN: usize = 10;

/// Absolute article links found on a landing page, de-duplicated, at most `cap`.
pub fn discover_links(html: &str, base: &Url, cap: usize) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut out: Vec<String> = Vec::new();
    for raw in LINK_SELECTORS {
        let Ok(sel) = Selector::parse(raw) else { continue };
        for href in doc.select(&sel).filter_map(|el| el.value().attr("href")) {
            let Ok(u) = base.join(href.trim()) else { continue };
            if !matches!(u.scheme(), "http" | "https") {
                continue;
            }
            let s = u.to_string();
            if s.len() > MIN_LINK_LEN && !out.contains(&s) {
                out.push(s);
            }
            if out.len() >= cap {
                return out;
            }
        }
    }
    out
}

fn first_text(doc: &Html, raw: &str) -> Option<String> {
    let sel = Selector::parse(raw).ok()?;
    doc.select(&sel)
        .map(|el| normalize_text(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// `<title>`, else the first `<h1>`.
pub fn page_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    first_text(&doc, "title").or_else(|| first_text(&doc, "h1"))
}

pub fn page_date(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    DATE_SELECTORS.iter().find_map(|raw| {
        let sel = Selector::parse(raw).ok()?;
        let el = doc.select(&sel).next()?;
        let v = match el.value().attr("datetime") {
            Some(d) => d.trim().to_string(),
            None => normalize_text(&el.text().collect::<String>()),
        };
        (!v.is_empty()).then_some(v)
    })
}

pub struct DirectScrapeProcessor {
    sites: Vec<String>,
    keywords: KeywordSet,
    dates: DatePolicy,
    max_articles: usize,
    delay: Duration,
}

impl DirectScrapeProcessor {
    pub fn new(sites: Vec<String>, keywords: KeywordSet, min_year: i32, max_articles: usize, delay: Duration) -> Self {
        Self {
            sites,
            keywords,
            dates: DatePolicy::YearAtLeast(min_year),
            max_articles,
            delay,
        }
    }

    /// Date policy first, then title relevance. Returns the title and the
    /// page date on admission.
    fn screen_page(&self, html: &str) -> Result<(String, String), SkipReason> {
        let pub_date = page_date(html).unwrap_or_default();
        if !self.dates.admits(&pub_date) {
            return Err(SkipReason::TooOld);
        }
        let title = page_title(html).ok_or(SkipReason::NotRelevant)?;
        if !self.keywords.is_match(&title) {
            return Err(SkipReason::NotRelevant);
        }
        Ok((title, pub_date))
    }

    async fn process_link(
        &self,
        site: &str,
        link: &str,
        pipeline: &Pipeline,
        progress: &ProgressTracker,
    ) -> ItemOutcome {
        let page = match pipeline.http.get(link).await {
            Ok(p) => p,
            Err(e) => {
                log_fetch_failure(&e, "article page");
                return ItemOutcome::Skipped(SkipReason::Unreachable);
            }
        };
        let (title, pub_date) = match self.screen_page(&page.body) {
            Ok(admitted) => admitted,
            Err(reason) => return ItemOutcome::Skipped(reason),
        };
        let Some(body) = pipeline.extract_fetched(link, &page.body, progress).await else {
            return ItemOutcome::Skipped(SkipReason::ExtractionFailed);
        };
        if !self.keywords.is_match(&body.content) {
            return ItemOutcome::Skipped(SkipReason::NotRelevant);
        }

        let tags = pipeline.full_tags(&format!("{title} {}", body.content), &self.keywords);
        let cand = Candidate {
            title,
            url: link.to_string(),
            pub_date,
            description: String::new(),
            source_type: SourceType::DirectScrape,
            feed_url: site.to_string(),
        };
        pipeline.store(cand, body.content, tags).await
    }
}

#[async_trait]
impl SourceProcessor for DirectScrapeProcessor {
    fn name(&self) -> &'static str {
        "direct_scrape"
    }

    fn category(&self) -> &'static str {
        "direct_scraping"
    }

    fn source_type(&self) -> SourceType {
        SourceType::DirectScrape
    }

    fn sources(&self) -> Vec<String> {
        self.sites.clone()
    }

    async fn process_source(
        &self,
        source: &str,
        pipeline: &Pipeline,
        progress: &ProgressTracker,
    ) -> Result<SourceReport, SourceError> {
        let base = parse_source_url(source)?;
        let landing = pipeline.http.get(source.trim()).await?;
        let links = discover_links(&landing.body, &base, self.max_articles);
        tracing::info!(target: "ingest", site = %source, links = links.len(), "landing page scanned");

        let mut report = SourceReport {
            fetched: links.len(),
            ..SourceReport::default()
        };
        for link in links {
            if let Some(reason) = pipeline.admit(&link, SourceType::DirectScrape).await {
                report.record(ItemOutcome::Skipped(reason));
                continue;
            }
            let outcome = self.process_link(source, &link, pipeline, progress).await;
            report.record(outcome);
            pace(self.delay).await;
        }
        Ok(report)
    }
}
