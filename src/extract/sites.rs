// src/extract/sites.rs
//! Per-domain extraction rules and the legislative document overrides.

use scraper::{Html, Selector};

use super::{element_text, lines_text, select_first_text};

/// Selector rule for one publisher. `priority` selectors win at the minimum
/// content length (CNN video pages carry only a short blurb), the ordinary
/// `selectors` must clear the selector threshold.
#[derive(Debug)]
pub struct SiteRule {
    pub domain: &'static str,
    pub priority: &'static [&'static str],
    pub selectors: &'static [&'static str],
}

pub const SITE_RULES: &[SiteRule] = &[
    SiteRule {
        domain: "cnn.com",
        priority: &[".video-content"],
        selectors: &[
            ".article__content",
            ".l-container .zn-body__paragraph",
            ".article-content",
            ".story-body",
            "article .zn-body__paragraph",
        ],
    },
    SiteRule {
        domain: "venturebeat.com",
        priority: &[],
        selectors: &[
            ".article-content",
            ".entry-content",
            ".post-content",
            ".article-body",
            "article .content",
        ],
    },
    SiteRule {
        domain: "arstechnica.com",
        priority: &[],
        selectors: &[
            ".article-content",
            ".entry-content",
            "article .post-content",
            ".article-body",
            "article .content",
        ],
    },
    SiteRule {
        domain: "reuters.com",
        priority: &[],
        selectors: &[
            ".StandardArticleBody_body",
            ".ArticleBodyWrapper",
            ".article-body",
            ".story-body",
            "article .content",
        ],
    },
];

/// Lower-cased host without a leading `www.`.
pub fn normalized_host(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|rest| rest.ends_with('.'))
}

pub fn rule_for(host: &str) -> Option<&'static SiteRule> {
    SITE_RULES.iter().find(|r| host_matches(host, r.domain))
}

pub(crate) fn apply_rule(doc: &Html, rule: &SiteRule, min_content: usize, min_selector: usize) -> Option<String> {
    for sel in rule.priority {
        if let Some(text) = select_first_text(doc, sel) {
            if text.chars().count() > min_content {
                return Some(text);
            }
        }
    }
    for sel in rule.selectors {
        if let Some(text) = select_first_text(doc, sel) {
            if text.chars().count() > min_selector {
                tracing::debug!(target: "extract", domain = rule.domain, selector = sel, "site rule matched");
                return Some(text);
            }
        }
    }
    None
}

// --- govinfo.gov bill packages ---

/// `https://www.govinfo.gov/app/details/BILLS-119hr5853ih/...` -> `BILLS-119hr5853ih`.
pub fn govinfo_bill_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = normalized_host(url)?;
    if !host_matches(&host, "govinfo.gov") {
        return None;
    }
    let mut segs = parsed.path_segments()?;
    if segs.next()? != "app" || segs.next()? != "details" {
        return None;
    }
    segs.next().filter(|id| !id.is_empty()).map(str::to_string)
}

pub fn govinfo_xml_url(bill_id: &str) -> String {
    format!("https://www.govinfo.gov/content/pkg/{bill_id}/xml/{bill_id}.xml")
}

pub fn govinfo_html_url(bill_id: &str) -> String {
    format!("https://www.govinfo.gov/content/pkg/{bill_id}/html/{bill_id}.htm")
}

/// Bill packages smaller than this are error pages or stubs.
pub const GOVINFO_MIN_BYTES: usize = 1000;

pub fn wrap_govinfo_xml(xml: &str) -> String {
    let trimmed = xml.trim_start();
    let body = if trimmed.starts_with("<?xml") {
        trimmed
            .find("?>")
            .map(|i| trimmed[i + 2..].trim_start())
            .unwrap_or(trimmed)
    } else {
        trimmed
    };
    format!("<body><div class='govinfo-content'>{body}</div></body>")
}

pub fn govinfo_html_body(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("body").ok()?;
    doc.select(&sel).next().map(|b| b.html())
}

// --- senado.leg.br ---

pub fn is_senado(host: &str) -> bool {
    host_matches(host, "senado.leg.br")
}

/// Rebuilds a minimal page from `#textoMateria` and the `#materia h1` title.
pub(crate) fn senado_document(doc: &Html) -> Option<(String, usize)> {
    let body_sel = Selector::parse("#textoMateria").ok()?;
    let body = doc.select(&body_sel).next()?;
    let text = lines_text(body);
    if text.is_empty() {
        return None;
    }
    let title = Selector::parse("#materia h1")
        .ok()
        .and_then(|s| doc.select(&s).next().map(element_text))
        .unwrap_or_default();
    let chars = text.chars().count();
    let html = format!(
        "<body><div class='senado-content'><h1>{}</h1><div id='textoMateria'>{}</div></div></body>",
        html_escape::encode_text(&title),
        html_escape::encode_text(&text)
    );
    Some((html, chars))
}
