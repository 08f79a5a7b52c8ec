// tests/idempotent_run.rs
use chrono::NaiveDate;
use news_collector::fetch::FixtureFetcher;
use news_collector::model::ArticleMetadata;
use news_collector::progress::progress_path;
use news_collector::storage::{article_id, MemoryStore, ObjectStore, StorageLayout};
use news_collector::{run_with, LogIndexRenderer, RunConfig};
use std::path::Path;
use std::sync::Arc;

const FEED_URL: &str = "https://news.test/rss";
const ARTICLE_URL: &str = "https://news.test/lagos-solar";
const MISSING_URL: &str = "https://news.test/missing";
const MARKETS_PAGE: &str =
    "https://pm.test/markets?limit=100&offset=0&closed=false&order=volume&ascending=false";

fn fetcher() -> Arc<FixtureFetcher> {
    Arc::new(
        FixtureFetcher::new()
            .with_page(FEED_URL, include_str!("fixtures/news_feed.xml"))
            .with_page(ARTICLE_URL, include_str!("fixtures/article_lagos.html"))
            .with_page(MARKETS_PAGE, "[]"),
    )
}

fn config(progress_dir: &Path) -> RunConfig {
    let mut c = RunConfig::default();
    c.progress_dir = progress_dir.to_path_buf();
    c.date = NaiveDate::from_ymd_opt(2025, 1, 6);
    c.item_delay_ms = 0;
    c.archive_base = "https://archive.test".into();
    c.sources.rss = vec![FEED_URL.into()];
    c.sources.direct = vec![];
    c.sources.legislation = vec![];
    c.polymarket.api_url = "https://pm.test/markets".into();
    c.news_keywords = vec!["solar energy".into(), "energy".into(), "gas".into()];
    c
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

#[tokio::test]
async fn second_run_writes_nothing_and_skips_before_fetch() {
    let store = Arc::new(MemoryStore::new());
    let http = fetcher();
    let first_dir = tempfile::tempdir().unwrap();

    let s1 = run_with(&config(first_dir.path()), http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    let rss = s1.phase("rss_news").unwrap();
    assert_eq!(rss.completed, 1);
    assert_eq!(rss.items.fetched, 5);
    assert_eq!(rss.items.saved, 1);
    // too old, not relevant, in-feed duplicate, extraction failed
    assert_eq!(rss.items.skipped, 4);
    assert_eq!(s1.indexed, Some(1));
    assert_eq!(http.hits(ARTICLE_URL), 1);
    assert_eq!(http.hits("https://news.test/old-gas"), 0);
    assert_eq!(http.hits("https://news.test/football"), 0);
    assert_eq!(http.hits(&format!("https://archive.test/newest/{MISSING_URL}")), 1);

    let layout = StorageLayout::new("news", NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    let id = article_id(ARTICLE_URL);
    let kind = news_collector::model::SourceType::RssFeed;
    let expected = sorted(vec![layout.content_key(kind, &id), layout.metadata_key(kind, &id)]);
    assert_eq!(sorted(store.keys()), expected);
    assert_eq!(store.put_count(), 2);

    // A new progress file forces the feed to be walked again; the primed
    // manifest must stop the known link before its page is requested.
    let second_dir = tempfile::tempdir().unwrap();
    let s2 = run_with(&config(second_dir.path()), http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    assert_eq!(s2.phase("rss_news").unwrap().items.saved, 0);
    assert_eq!(http.hits(ARTICLE_URL), 1);
    assert_eq!(sorted(store.keys()), expected);
    assert_eq!(store.put_count(), 2);
    // failed items are not marked processed, so they are retried
    assert_eq!(http.hits(MISSING_URL), 2);

    // Same progress file: the completed feed is not even fetched.
    let feed_hits = http.hits(FEED_URL);
    let s3 = run_with(&config(first_dir.path()), http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    assert_eq!(s3.phase("rss_news").unwrap().skipped_completed, 1);
    assert_eq!(http.hits(FEED_URL), feed_hits);
}

#[tokio::test]
async fn stored_metadata_carries_tags() {
    let store = Arc::new(MemoryStore::new());
    let dir = tempfile::tempdir().unwrap();
    run_with(&config(dir.path()), fetcher(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();

    let layout = StorageLayout::new("news", NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    let key = layout.metadata_key(news_collector::model::SourceType::RssFeed, &article_id(ARTICLE_URL));
    let bytes = store.get(&key).await.unwrap().expect("metadata stored");
    let meta: ArticleMetadata = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(meta.url, ARTICLE_URL);
    assert_eq!(meta.feed_url, FEED_URL);
    assert_eq!(meta.title, "Lagos announces solar energy initiative in Nigeria");
    assert_eq!(meta.description, "State programme puts rooftop panels on schools & clinics.");
    assert_eq!(meta.tags.continents, vec!["Africa"]);
    assert_eq!(meta.tags.matched_keywords, vec!["solar energy", "energy"]);
    assert_eq!(meta.tags.core_topics, vec!["energy"]);
    assert!(meta.content_length > 200);
    assert!(meta.collection_date.ends_with('Z'));
    assert_eq!(store.content_type(&key).as_deref(), Some("application/json"));

    let raw: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(raw["source"], "RSS Feed");
    assert!(raw["tags"]["special_tags"].as_array().unwrap().is_empty());

    let progress: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(progress_path(dir.path(), "rss_news", day())).unwrap()).unwrap();
    assert_eq!(progress["rss_feeds"]["completed"][0], FEED_URL);
    assert_eq!(progress["total_articles"], 1);
    assert_eq!(progress["extraction_stats"]["successful_extractions"], 1);
    assert_eq!(progress["extraction_stats"]["failed_extractions"], 1);
}

#[tokio::test]
async fn fresh_run_rewrites_same_keys() {
    let store = Arc::new(MemoryStore::new());
    let http = fetcher();
    let dir = tempfile::tempdir().unwrap();
    run_with(&config(dir.path()), http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    let before = sorted(store.keys());

    let mut cfg = config(dir.path());
    cfg.fresh = true;
    let s = run_with(&cfg, http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    let rss = s.phase("rss_news").unwrap();
    assert_eq!(rss.completed, 1, "fresh mode ignores the progress file");
    assert_eq!(rss.items.saved, 1);
    assert_eq!(http.hits(ARTICLE_URL), 2);
    assert_eq!(sorted(store.keys()), before);
    assert_eq!(store.put_count(), 4);
}

#[tokio::test]
async fn failed_write_keeps_source_open_and_is_repaired() {
    let store = Arc::new(MemoryStore::new());
    let http = fetcher();
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new("news", day());
    let kind = news_collector::model::SourceType::RssFeed;
    let id = article_id(ARTICLE_URL);

    store.fail_puts_under(Some("news/2025-01-06/rss/content/"));
    let s1 = run_with(&config(dir.path()), http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    let rss = s1.phase("rss_news").unwrap();
    // the article and its in-feed duplicate both hit the failing content write
    assert_eq!(rss.items.failed, 2);
    assert_eq!(rss.items.saved, 0);
    assert_eq!(rss.completed, 0);
    assert_eq!(rss.failed, 1);
    assert!(store.keys().contains(&layout.metadata_key(kind, &id)));
    assert!(!store.keys().contains(&layout.content_key(kind, &id)));

    store.fail_puts_under(None);
    let s2 = run_with(&config(dir.path()), http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    let rss = s2.phase("rss_news").unwrap();
    assert_eq!(rss.skipped_completed, 0);
    assert_eq!(rss.completed, 1);
    assert_eq!(rss.items.saved, 1);
    assert_eq!(
        sorted(store.keys()),
        sorted(vec![layout.content_key(kind, &id), layout.metadata_key(kind, &id)])
    );

    let progress: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(progress_path(dir.path(), "rss_news", day())).unwrap()).unwrap();
    assert_eq!(progress["rss_feeds"]["completed"][0], FEED_URL);
}

#[tokio::test]
async fn next_day_collects_again_with_the_same_progress_dir() {
    let store = Arc::new(MemoryStore::new());
    let http = fetcher();
    let dir = tempfile::tempdir().unwrap();
    run_with(&config(dir.path()), http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    assert_eq!(http.hits(FEED_URL), 1);

    let mut next = config(dir.path());
    next.date = NaiveDate::from_ymd_opt(2025, 1, 7);
    let s = run_with(&next, http.clone(), store.clone(), &LogIndexRenderer)
        .await
        .unwrap();
    let rss = s.phase("rss_news").unwrap();
    assert_eq!(rss.skipped_completed, 0);
    assert_eq!(rss.items.saved, 1);
    assert_eq!(http.hits(FEED_URL), 2);

    let tuesday = StorageLayout::new("news", NaiveDate::from_ymd_opt(2025, 1, 7).unwrap());
    let key = tuesday.metadata_key(news_collector::model::SourceType::RssFeed, &article_id(ARTICLE_URL));
    assert!(store.keys().contains(&key));
    assert!(progress_path(dir.path(), "rss_news", day()).exists());
}
