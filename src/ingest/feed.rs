// src/ingest/feed.rs
//! Feed parsing with fallbacks: RSS 2.0 via quick-xml, then feed-rs (Atom,
//! RSS 1.0, JSON Feed), then a lenient markup scan for `item`/`entry`.

use metrics::{counter, histogram};
use quick_xml::de::from_str;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use super::normalize_text;
use super::types::FeedEntry;

const NO_TITLE: &str = "No Title";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

fn entry(title: Option<String>, link: Option<String>, pub_date: Option<String>, description: Option<String>) -> FeedEntry {
    let title = title.map(|t| normalize_text(&t)).unwrap_or_default();
    FeedEntry {
        title: if title.is_empty() { NO_TITLE.to_string() } else { title },
        link: link.map(|l| l.trim().to_string()).unwrap_or_default(),
        pub_date: pub_date.map(|d| d.trim().to_string()).unwrap_or_default(),
        description: description.map(|d| normalize_text(&d)).unwrap_or_default(),
    }
}

fn parse_rss(body: &str) -> Result<Vec<FeedEntry>, String> {
    let rss: Rss = from_str(&scrub_html_entities_for_xml(body)).map_err(|e| e.to_string())?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| entry(it.title, it.link, it.pub_date, it.description))
        .collect())
}

fn parse_with_feed_rs(body: &str) -> Result<Vec<FeedEntry>, String> {
    let feed = feed_rs::parser::parse(body.as_bytes()).map_err(|e| e.to_string())?;
    Ok(feed
        .entries
        .into_iter()
        .map(|e| {
            let link = e.links.first().map(|l| l.href.clone());
            let date = e
                .published
                .or(e.updated)
                .map(|d| d.to_rfc3339());
            let description = e
                .summary
                .map(|t| t.content)
                .or_else(|| e.content.and_then(|c| c.body));
            entry(e.title.map(|t| t.content), link, date, description)
        })
        .collect())
}

fn child_text(item: ElementRef<'_>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        let sel = Selector::parse(name).ok()?;
        item.select(&sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .filter(|t| !t.trim().is_empty())
    })
}

/// HTML parsing treats `<link>` as a void element, so the RSS link text ends
/// up as the following text node.
fn lenient_link(item: ElementRef<'_>) -> Option<String> {
    let sel = Selector::parse("link").ok()?;
    let link = item.select(&sel).next()?;
    if let Some(href) = link.value().attr("href") {
        return Some(href.to_string());
    }
    let inner: String = link.text().collect();
    if !inner.trim().is_empty() {
        return Some(inner);
    }
    link.next_sibling()
        .and_then(|n| n.value().as_text().map(|t| String::from(&**t)))
        .filter(|t| !t.trim().is_empty())
}

fn parse_lenient(body: &str) -> Result<Vec<FeedEntry>, String> {
    let doc = Html::parse_document(body);
    let mut out = Vec::new();
    for tag in ["item", "entry"] {
        let sel = Selector::parse(tag).map_err(|e| e.to_string())?;
        for item in doc.select(&sel) {
            out.push(entry(
                child_text(item, &["title"]),
                lenient_link(item),
                child_text(item, &["pubdate", "published", "updated"]),
                child_text(item, &["description", "summary", "content"]),
            ));
        }
        if !out.is_empty() {
            return Ok(out);
        }
    }
    Err("no item/entry elements".to_string())
}

type ParseStrategy = (&'static str, fn(&str) -> Result<Vec<FeedEntry>, String>);

const STRATEGIES: &[ParseStrategy] = &[
    ("rss", parse_rss),
    ("feed-rs", parse_with_feed_rs),
    ("lenient", parse_lenient),
];

/// First strategy yielding entries wins. Errors when every strategy errored;
/// a well-formed feed with no entries (recognised by a structural parser) is
/// `Ok(vec![])`. The lenient scan never vouches for an empty feed.
pub fn parse_feed(body: &str) -> Result<Vec<FeedEntry>, String> {
    let t0 = std::time::Instant::now();
    let mut errors = Vec::new();
    let mut parsed_empty = false;
    for (name, parse) in STRATEGIES {
        match parse(body) {
            Ok(entries) if !entries.is_empty() => {
                tracing::debug!(target: "ingest", strategy = name, entries = entries.len(), "feed parsed");
                histogram!("collector_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                counter!("collector_items_total").increment(entries.len() as u64);
                return Ok(entries);
            }
            Ok(_) => parsed_empty = true,
            Err(e) => errors.push(format!("{name}: {e}")),
        }
    }
    if parsed_empty {
        Ok(Vec::new())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
<item><title>Grid &amp; power&nbsp;news</title><link>https://a.test/1</link>
<pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
<description><![CDATA[<p>Solar <b>power</b> up</p>]]></description></item>
<item><link>https://a.test/2</link></item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>A</title><id>urn:x</id><updated>2025-01-06T10:00:00Z</updated>
<entry><title>Atom item</title><id>urn:1</id><link href="https://a.test/atom/1"/>
<updated>2025-01-06T10:00:00Z</updated><summary>Short summary</summary></entry>
</feed>"#;

    #[test]
    fn rss_items_are_normalized() {
        let v = parse_feed(RSS).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].title, "Grid & power news");
        assert_eq!(v[0].link, "https://a.test/1");
        assert_eq!(v[0].pub_date, "Mon, 06 Jan 2025 10:00:00 GMT");
        assert_eq!(v[0].description, "Solar power up");
        assert_eq!(v[1].title, "No Title");
    }

    #[test]
    fn atom_falls_through_to_feed_rs() {
        let v = parse_feed(ATOM).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].link, "https://a.test/atom/1");
        assert_eq!(v[0].description, "Short summary");
        assert!(v[0].pub_date.starts_with("2025-01-06"));
    }

    #[test]
    fn lenient_scan_recovers_link_text() {
        let v = parse_lenient("<item><title>x</title><link>https://a.test/l</link><pubDate>2025</pubDate></item>")
            .unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].link, "https://a.test/l");
        assert_eq!(v[0].pub_date, "2025");
    }

    #[test]
    fn html_page_is_not_a_feed() {
        let err = parse_feed("<html><body>Service moved to a new address</body></html>").unwrap_err();
        assert!(err.contains("lenient"));
    }

    #[test]
    fn empty_channel_is_an_empty_feed() {
        let v = parse_feed(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title></channel></rss>"#)
            .unwrap();
        assert!(v.is_empty());
    }
}
