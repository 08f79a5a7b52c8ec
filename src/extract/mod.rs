// src/extract/mod.rs
//! Best-effort article body extraction.
//!
//! Order of attempts for one page: legislative overrides, per-domain
//! selector rules, generic selectors, paragraph concatenation. A failed
//! fetch or a too-short body falls back to the newest web-archive snapshot,
//! extracted once without a further archive hop.

pub mod sites;

use metrics::histogram;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use crate::fetch::{FetchError, HttpFetch};

/// A selector candidate must be longer than this to win outright.
pub const MIN_SELECTOR_CHARS: usize = 200;
/// Extracted bodies must be longer than this.
pub const MIN_CONTENT_CHARS: usize = 100;

const STRIPPED: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "iframe",
];

const GENERIC_SELECTORS: &[&str] = &[
    "article",
    "[data-module=\"ArticleBody\"]",
    ".article-body",
    ".story-body",
    ".post-content",
    ".entry-content",
    ".content",
    "main",
    ".article-content",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SiteSpecific,
    Generic,
    Paragraphs,
    Archive,
}

#[derive(Debug, Clone)]
pub struct Extracted {
    pub content: String,
    pub strategy: Strategy,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("insufficient content ({chars} chars)")]
    InsufficientContent { chars: usize },
    #[error("no archived snapshot for {url}")]
    NoArchive { url: String },
}

fn is_stripped(el: &ElementRef<'_>) -> bool {
    STRIPPED.contains(&el.value().name())
}

fn inside_stripped(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| is_stripped(&a))
}

fn push_text(el: ElementRef<'_>, out: &mut Vec<String>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let t = text.trim();
            if !t.is_empty() {
                out.push(t.to_string());
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !is_stripped(&child_el) {
                push_text(child_el, out);
            }
        }
    }
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element, boilerplate subtrees removed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    push_text(el, &mut parts);
    collapse_ws(&parts.join(" "))
}

/// Text nodes of an element, one per line.
pub(crate) fn lines_text(el: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    push_text(el, &mut parts);
    parts
        .iter()
        .map(|p| collapse_ws(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the first element matching `sel` that is not inside boilerplate.
pub(crate) fn select_first_text(doc: &Html, sel: &str) -> Option<String> {
    let selector = Selector::parse(sel).ok()?;
    doc.select(&selector)
        .find(|el| !inside_stripped(el))
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn paragraphs_text(doc: &Html) -> String {
    let Ok(p) = Selector::parse("p") else {
        return String::new();
    };
    doc.select(&p)
        .filter(|el| !inside_stripped(el))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract from an already fetched page. No network.
pub fn extract_document(url: &str, html: &str) -> Result<Extracted, ExtractionFailure> {
    let doc = Html::parse_document(html);
    let host = sites::normalized_host(url).unwrap_or_default();

    if sites::is_senado(&host) {
        if let Some((content, chars)) = sites::senado_document(&doc) {
            if chars > MIN_CONTENT_CHARS {
                return Ok(Extracted {
                    content,
                    strategy: Strategy::SiteSpecific,
                });
            }
        }
    }

    if let Some(rule) = sites::rule_for(&host) {
        if let Some(content) = sites::apply_rule(&doc, rule, MIN_CONTENT_CHARS, MIN_SELECTOR_CHARS) {
            return Ok(Extracted {
                content,
                strategy: Strategy::SiteSpecific,
            });
        }
        tracing::debug!(target: "extract", %host, "site rule found nothing, using generic selectors");
    }

    let mut best = String::new();
    for sel in GENERIC_SELECTORS {
        if let Some(text) = select_first_text(&doc, sel) {
            let n = text.chars().count();
            if n > MIN_SELECTOR_CHARS {
                return Ok(Extracted {
                    content: text,
                    strategy: Strategy::Generic,
                });
            }
            if n > best.chars().count() {
                best = text;
            }
        }
    }

    let paragraphs = paragraphs_text(&doc);
    let (content, strategy) = if paragraphs.chars().count() >= best.chars().count() {
        (paragraphs, Strategy::Paragraphs)
    } else {
        (best, Strategy::Generic)
    };
    let chars = content.chars().count();
    if chars > MIN_CONTENT_CHARS {
        Ok(Extracted { content, strategy })
    } else {
        Err(ExtractionFailure::InsufficientContent { chars })
    }
}

/// First link on an archive lookup page that points at a snapshot.
pub fn find_archive_link(html: &str, archive_base: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").ok()?;
    let href = doc
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .find(|h| h.contains("archive.today") || h.contains("archive.is"))?;
    if href.starts_with("http") {
        Some(href.to_string())
    } else {
        Some(format!("{}{}", archive_base.trim_end_matches('/'), href))
    }
}

pub struct Extractor {
    http: Arc<dyn HttpFetch>,
    archive_base: String,
}

impl Extractor {
    pub fn new(http: Arc<dyn HttpFetch>, archive_base: impl Into<String>) -> Self {
        Self {
            http,
            archive_base: archive_base.into(),
        }
    }

    /// Fetch `url` and extract its body, falling back to the archive.
    pub async fn extract(&self, url: &str) -> Result<Extracted, ExtractionFailure> {
        let t0 = std::time::Instant::now();
        let out = match self.extract_once(url).await {
            Ok(x) => Ok(x),
            Err(primary) => self.after_failure(url, primary).await,
        };
        histogram!("collector_extract_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        out
    }

    /// Same as [`Extractor::extract`] for a page the caller already holds.
    pub async fn extract_fetched(&self, url: &str, html: &str) -> Result<Extracted, ExtractionFailure> {
        match extract_document(url, html) {
            Ok(x) => Ok(x),
            Err(primary) => self.after_failure(url, primary).await,
        }
    }

    async fn after_failure(
        &self,
        url: &str,
        primary: ExtractionFailure,
    ) -> Result<Extracted, ExtractionFailure> {
        tracing::debug!(target: "extract", %url, error = %primary, "direct extraction failed, trying archive");
        match self.from_archive(url).await {
            Ok(mut x) => {
                tracing::info!(target: "extract", %url, "extracted from archived snapshot");
                x.strategy = Strategy::Archive;
                Ok(x)
            }
            Err(e) => {
                tracing::debug!(target: "extract", %url, error = %e, "archive fallback failed");
                Err(primary)
            }
        }
    }

    async fn from_archive(&self, url: &str) -> Result<Extracted, ExtractionFailure> {
        let lookup = format!("{}/newest/{}", self.archive_base.trim_end_matches('/'), url);
        let page = self.http.get(&lookup).await?;
        let snapshot = find_archive_link(&page.body, &self.archive_base).ok_or_else(|| {
            ExtractionFailure::NoArchive {
                url: url.to_string(),
            }
        })?;
        self.extract_once(&snapshot).await
    }

    async fn extract_once(&self, url: &str) -> Result<Extracted, ExtractionFailure> {
        if let Some(bill_id) = sites::govinfo_bill_id(url) {
            if let Some(content) = self.govinfo_package(&bill_id).await {
                return Ok(Extracted {
                    content,
                    strategy: Strategy::SiteSpecific,
                });
            }
        }
        let page = self.http.get(url).await?;
        extract_document(url, &page.body)
    }

    async fn govinfo_package(&self, bill_id: &str) -> Option<String> {
        match self.http.get(&sites::govinfo_xml_url(bill_id)).await {
            Ok(p) if p.body.len() > sites::GOVINFO_MIN_BYTES => {
                tracing::info!(target: "extract", bill_id, "govinfo XML package");
                return Some(sites::wrap_govinfo_xml(&p.body));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(target: "extract", bill_id, error = %e, "no govinfo XML"),
        }
        match self.http.get(&sites::govinfo_html_url(bill_id)).await {
            Ok(p) if p.body.len() > sites::GOVINFO_MIN_BYTES => sites::govinfo_html_body(&p.body),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(target: "extract", bill_id, error = %e, "no govinfo HTML");
                None
            }
        }
    }
}
