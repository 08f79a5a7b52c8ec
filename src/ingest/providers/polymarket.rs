// src/ingest/providers/polymarket.rs
//! Political prediction markets from a Gamma-style markets API.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::PolymarketConfig;
use crate::ingest::types::{SourceError, SourceProcessor, SourceReport};
use crate::ingest::{parse_source_url, Candidate, ItemOutcome, Pipeline, SkipReason};
use crate::model::{MarketData, SourceType, Tags};
use crate::progress::ProgressTracker;
use crate::tagger::KeywordSet;

pub const MARKET_TAG: &str = "prediction_market";
pub const MARKET_TOPIC: &str = "geopolitics";
const MAX_DESCRIPTION_CHARS: usize = 500;

/// One market as the API returns it. Numbers may arrive as strings and the
/// outcome arrays as JSON-encoded strings.
#[derive(Debug, Clone)]
pub struct Market {
    pub id: String,
    pub slug: String,
    pub question: String,
    pub description: String,
    pub category: String,
    pub start_date: String,
    pub data: MarketData,
    pub raw: Value,
}

fn text_field(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn number_field(v: &Value, key: &str) -> f64 {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn list_field(v: &Value, key: &str) -> Vec<Value> {
    match v.get(key) {
        Some(Value::Array(xs)) => xs.clone(),
        Some(Value::String(s)) => serde_json::from_str::<Vec<Value>>(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

impl Market {
    pub fn from_json(raw: Value) -> Self {
        let outcomes = list_field(&raw, "outcomes")
            .into_iter()
            .map(|o| match o {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        let prices = list_field(&raw, "outcomePrices")
            .into_iter()
            .filter_map(|p| match p {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect();
        let start_date = Some(text_field(&raw, "startDate"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| text_field(&raw, "createdAt"));
        let question = Some(text_field(&raw, "question"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown Market".to_string());
        Self {
            id: text_field(&raw, "id"),
            slug: text_field(&raw, "slug"),
            question,
            description: text_field(&raw, "description"),
            category: text_field(&raw, "category"),
            start_date,
            data: MarketData {
                volume: number_field(&raw, "volume"),
                liquidity: number_field(&raw, "liquidity"),
                outcomes,
                prices,
                closed: raw.get("closed").and_then(Value::as_bool).unwrap_or(false),
            },
            raw,
        }
    }

    pub fn web_url(&self, web_base: &str) -> String {
        let key = if self.slug.is_empty() { &self.id } else { &self.slug };
        format!("{}/{}", web_base.trim_end_matches('/'), key)
    }
}

/// Political by category, or by a whole-word political keyword in the text.
pub fn is_political(m: &Market, political: &KeywordSet) -> bool {
    let category = m.category.to_lowercase();
    if crate::config::sources::POLITICAL_CATEGORIES
        .iter()
        .any(|c| category.contains(c))
    {
        return true;
    }
    political.is_match(&format!("{} {}", m.question, m.description))
}

fn thousands(v: f64) -> String {
    let digits = format!("{:.0}", v.abs());
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if v < 0.0 {
        format!("-{out}")
    } else {
        out
    }
}

/// Self-contained HTML page for one market.
pub fn render_market(m: &Market) -> String {
    use html_escape::encode_text as esc;

    let prices: String = m
        .data
        .outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| match m.data.prices.get(i) {
            Some(p) => format!("<li>{}: {:.1}%</li>", esc(outcome), p * 100.0),
            None => format!("<li>{}: N/A</li>", esc(outcome)),
        })
        .collect();
    let raw = serde_json::to_string_pretty(&m.raw).unwrap_or_default();
    let category = if m.category.is_empty() { "N/A" } else { &m.category };
    let status = if m.data.closed { "Closed" } else { "Open" };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>{question}</title>
</head>
<body>
<h1>{question}</h1>
<div class="market-stats"><table>
<tr><td>Volume:</td><td>${volume}</td></tr>
<tr><td>Liquidity:</td><td>${liquidity}</td></tr>
<tr><td>Status:</td><td>{status}</td></tr>
<tr><td>Category:</td><td>{category}</td></tr>
</table></div>
<div class="market-prices"><h3>Current Prices</h3><ul>{prices}</ul></div>
<div class="market-description"><h3>Resolution Criteria</h3><p>{description}</p></div>
<div class="market-metadata"><h3>Raw Data</h3><pre>{raw}</pre></div>
</body>
</html>"#,
        question = esc(&m.question),
        volume = thousands(m.data.volume),
        liquidity = thousands(m.data.liquidity),
        category = esc(category),
        description = esc(&m.description),
        raw = esc(&raw),
    )
}

pub struct PolymarketProcessor {
    cfg: PolymarketConfig,
    political: KeywordSet,
}

impl PolymarketProcessor {
    pub fn new(cfg: PolymarketConfig, political: KeywordSet) -> Self {
        Self { cfg, political }
    }

    fn page_url(&self, offset: usize) -> String {
        format!(
            "{}?limit={}&offset={}&closed=false&order=volume&ascending=false",
            self.cfg.api_url.trim(),
            self.cfg.page_size.max(1),
            offset
        )
    }

    /// Open markets by volume until a short page or the market cap.
    async fn fetch_markets(&self, pipeline: &Pipeline) -> Result<(usize, Vec<Market>), SourceError> {
        let page_size = self.cfg.page_size.max(1);
        let mut seen = 0;
        let mut political = Vec::new();
        let mut offset = 0;
        while offset < self.cfg.max_markets {
            let url = self.page_url(offset);
            let page = pipeline.http.get(&url).await?;
            let batch: Vec<Value> = serde_json::from_str(&page.body).map_err(|e| SourceError::Parse {
                source_url: url.clone(),
                reason: e.to_string(),
            })?;
            let n = batch.len();
            seen += n;
            let before = political.len();
            political.extend(
                batch
                    .into_iter()
                    .map(Market::from_json)
                    .filter(|m| is_political(m, &self.political)),
            );
            tracing::info!(target: "ingest", offset, markets = n, political = political.len() - before, "market page");
            if n < page_size {
                break;
            }
            offset += page_size;
        }
        Ok((seen, political))
    }

    async fn process_market(&self, m: Market, pipeline: &Pipeline) -> ItemOutcome {
        let url = m.web_url(&self.cfg.web_base);
        if let Some(reason) = pipeline.admit(&url, SourceType::PredictionMarket).await {
            return ItemOutcome::Skipped(reason);
        }
        let text = format!("{} {}", m.question, m.description);
        let tags = Tags {
            continents: pipeline.tagger.detect_continents(&text),
            countries: pipeline.tagger.detect_countries(&text),
            core_topics: vec![MARKET_TOPIC.to_string()],
            special_tags: vec![MARKET_TAG.to_string()],
            market_data: Some(m.data.clone()),
            ..Tags::default()
        };
        let content = render_market(&m);
        let cand = Candidate {
            title: m.question,
            url,
            pub_date: m.start_date,
            description: m.description.chars().take(MAX_DESCRIPTION_CHARS).collect(),
            source_type: SourceType::PredictionMarket,
            feed_url: self.cfg.api_url.clone(),
        };
        pipeline.store(cand, content, tags).await
    }
}

#[async_trait]
impl SourceProcessor for PolymarketProcessor {
    fn name(&self) -> &'static str {
        "polymarket"
    }

    fn category(&self) -> &'static str {
        "prediction_markets"
    }

    fn source_type(&self) -> SourceType {
        SourceType::PredictionMarket
    }

    fn sources(&self) -> Vec<String> {
        vec![self.cfg.api_url.clone()]
    }

    async fn process_source(
        &self,
        source: &str,
        pipeline: &Pipeline,
        _progress: &ProgressTracker,
    ) -> Result<SourceReport, SourceError> {
        parse_source_url(source)?;
        let (seen, markets) = self.fetch_markets(pipeline).await?;
        let mut report = SourceReport {
            fetched: seen,
            skipped: seen - markets.len(),
            ..SourceReport::default()
        };
        for _ in 0..report.skipped {
            metrics::counter!("collector_skipped_total", "reason" => SkipReason::NotPolitical.as_str()).increment(1);
        }
        // Everything came from the listing call, so there is nothing to pace.
        for m in markets {
            report.record(self.process_market(m, pipeline).await);
        }
        Ok(report)
    }
}
