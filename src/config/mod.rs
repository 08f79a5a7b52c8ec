// src/config/mod.rs
//! Run configuration. Built by each entry point and passed into
//! [`crate::run`]; nothing here is read from global state after start-up.

pub mod sources;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sources::owned;

pub const ENV_CONFIG_PATH: &str = "COLLECTOR_CONFIG_PATH";
pub const ENV_FRESH_MODE: &str = "FRESH_MODE";
pub const DEFAULT_CONFIG_PATH: &str = "config/collector.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PolymarketConfig {
    pub api_url: String,
    pub web_base: String,
    pub page_size: usize,
    pub max_markets: usize,
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            api_url: "https://gamma-api.polymarket.com/markets".into(),
            web_base: "https://polymarket.com/event".into(),
            page_size: 100,
            max_markets: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceLists {
    pub rss: Vec<String>,
    pub direct: Vec<String>,
    pub legislation: Vec<String>,
}

impl Default for SourceLists {
    fn default() -> Self {
        Self {
            rss: owned(sources::RSS_FEEDS),
            direct: owned(sources::DIRECT_SITES),
            legislation: owned(sources::LEGISLATION_FEEDS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Ignore prior progress and stored state.
    pub fresh: bool,
    /// First segment of every object key.
    pub collection_root: String,
    /// Directory backing the filesystem object store.
    pub store_root: PathBuf,
    pub progress_dir: PathBuf,
    /// Sources processed concurrently per phase.
    pub workers: usize,
    pub item_delay_ms: u64,
    pub direct_item_delay_ms: u64,
    pub source_delay_ms: u64,
    pub http_timeout_secs: u64,
    /// News items dated before this year are dropped.
    pub min_year: i32,
    /// Collection date; today (local) when unset. Quote it in TOML.
    pub date: Option<NaiveDate>,
    pub archive_base: String,
    pub max_direct_articles: usize,
    pub tagging_tables: Option<PathBuf>,
    pub polymarket: PolymarketConfig,
    pub sources: SourceLists,
    pub news_keywords: Vec<String>,
    pub political_keywords: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fresh: false,
            collection_root: "news".into(),
            store_root: PathBuf::from("site"),
            progress_dir: PathBuf::from("."),
            workers: 10,
            item_delay_ms: 500,
            direct_item_delay_ms: 1000,
            source_delay_ms: 0,
            http_timeout_secs: 30,
            min_year: 2025,
            date: None,
            archive_base: "https://archive.today".into(),
            max_direct_articles: 50,
            tagging_tables: None,
            polymarket: PolymarketConfig::default(),
            sources: SourceLists::default(),
            news_keywords: owned(sources::NEWS_KEYWORDS),
            political_keywords: owned(sources::POLITICAL_KEYWORDS),
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parsing collector config TOML")?;
        cfg.validated()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading collector config from {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// 1) $COLLECTOR_CONFIG_PATH (must exist)
    /// 2) config/collector.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from(&default_path);
        }
        Ok(Self::default())
    }

    fn validated(mut self) -> Result<Self> {
        if self.workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        if self.collection_root.trim_matches('/').is_empty() {
            return Err(anyhow!("collection_root must not be empty"));
        }
        self.collection_root = self.collection_root.trim_matches('/').to_string();
        Ok(self)
    }

    pub fn collection_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn direct_item_delay(&self) -> Duration {
        Duration::from_millis(self.direct_item_delay_ms)
    }

    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// `FRESH_MODE` in {1, true, yes}, any case.
pub fn fresh_from_env() -> bool {
    std::env::var(ENV_FRESH_MODE)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = RunConfig::from_toml_str(
            r#"
            workers = 3
            date = "2025-01-06"
            collection_root = "/news/"
            [sources]
            rss = ["https://feed.test/rss"]
            [polymarket]
            max_markets = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.collection_root, "news");
        assert_eq!(cfg.collection_date(), NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        assert_eq!(cfg.sources.rss, vec!["https://feed.test/rss".to_string()]);
        assert!(!cfg.sources.legislation.is_empty());
        assert_eq!(cfg.polymarket.max_markets, 50);
        assert_eq!(cfg.polymarket.page_size, 100);
        assert_eq!(cfg.min_year, 2025);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(RunConfig::from_toml_str("workers = 0").is_err());
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "TRUE", " yes "] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["0", "false", "", "no"] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // nothing on disk -> defaults
        assert_eq!(RunConfig::load_default().unwrap(), RunConfig::default());

        let p = tmp.path().join("custom.toml");
        fs::write(&p, "workers = 2").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(RunConfig::load_default().unwrap().workers, 2);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(RunConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
