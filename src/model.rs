// src/model.rs
//! Article record and the metadata JSON shape downstream readers depend on.

use serde::{Deserialize, Serialize};

/// Where an article came from. Serialized as the human label stored in the
/// metadata `source` field; [`SourceType::segment`] gives the path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "RSS Feed")]
    RssFeed,
    #[serde(rename = "Direct Scraping")]
    DirectScrape,
    #[serde(rename = "Legislation Feed")]
    LegislationFeed,
    #[serde(rename = "Polymarket")]
    PredictionMarket,
}

impl SourceType {
    /// Path segment under `<root>/<date>/`.
    pub fn segment(self) -> &'static str {
        match self {
            SourceType::RssFeed => "rss",
            SourceType::DirectScrape => "direct",
            SourceType::LegislationFeed => "legislation",
            SourceType::PredictionMarket => "polymarket",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceType::RssFeed => "RSS Feed",
            SourceType::DirectScrape => "Direct Scraping",
            SourceType::LegislationFeed => "Legislation Feed",
            SourceType::PredictionMarket => "Polymarket",
        }
    }

    pub const ALL: [SourceType; 4] = [
        SourceType::RssFeed,
        SourceType::DirectScrape,
        SourceType::LegislationFeed,
        SourceType::PredictionMarket,
    ];
}

/// Market snapshot carried in prediction-market tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub volume: f64,
    pub liquidity: f64,
    pub outcomes: Vec<String>,
    pub prices: Vec<f64>,
    pub closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tags {
    pub continents: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub core_topics: Vec<String>,
    #[serde(default)]
    pub special_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_data: Option<MarketData>,
}

/// One collected item, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    pub pub_date: String,
    pub description: String,
    pub content: String,
    pub source_type: SourceType,
    /// Feed or landing page the item was discovered on.
    pub feed_url: String,
    pub collection_date: chrono::DateTime<chrono::Utc>,
    pub tags: Tags,
}

/// Stored at `.../metadata/<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub title: String,
    pub url: String,
    pub pub_date: String,
    pub description: String,
    pub source: SourceType,
    pub feed_url: String,
    pub content_length: usize,
    pub collection_date: String,
    pub tags: Tags,
}

impl ArticleRecord {
    pub fn metadata(&self) -> ArticleMetadata {
        ArticleMetadata {
            title: self.title.clone(),
            url: self.url.clone(),
            pub_date: self.pub_date.clone(),
            description: self.description.clone(),
            source: self.source_type,
            feed_url: self.feed_url.clone(),
            content_length: self.content.chars().count(),
            collection_date: self
                .collection_date
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            tags: self.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn metadata_json_has_expected_fields() {
        let rec = ArticleRecord {
            title: "T".into(),
            url: "https://example.test/a".into(),
            pub_date: "Mon, 06 Jan 2025 10:00:00 GMT".into(),
            description: "d".into(),
            content: "héllo".into(),
            source_type: SourceType::RssFeed,
            feed_url: "https://example.test/feed".into(),
            collection_date: chrono::Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap(),
            tags: Tags {
                continents: vec!["Unclear".into()],
                ..Tags::default()
            },
        };
        let v = serde_json::to_value(rec.metadata()).unwrap();
        assert_eq!(v["source"], "RSS Feed");
        assert_eq!(v["content_length"], 5);
        assert_eq!(v["collection_date"], "2025-01-06T12:00:00Z");
        assert_eq!(v["tags"]["special_tags"], serde_json::json!([]));
        assert!(v["tags"].get("countries").is_none());
        assert!(v["tags"].get("market_data").is_none());
    }

    #[test]
    fn segments_are_stable() {
        let segs: Vec<_> = SourceType::ALL.iter().map(|s| s.segment()).collect();
        assert_eq!(segs, vec!["rss", "direct", "legislation", "polymarket"]);
    }
}
