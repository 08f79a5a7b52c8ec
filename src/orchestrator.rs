// src/orchestrator.rs
//! Phase sequencing. Sources inside a phase run on a bounded pool; items
//! inside a source stay sequential.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RunConfig;
use crate::extract::Extractor;
use crate::fetch::HttpFetch;
use crate::ingest::providers::{DirectScrapeProcessor, LegislationProcessor, PolymarketProcessor, RssNewsProcessor};
use crate::ingest::types::{SourceProcessor, SourceReport, SourceState};
use crate::ingest::{ensure_metrics_described, keyword_set, pace, Pipeline};
use crate::progress::ProgressTracker;
use crate::storage::manifest::Manifest;
use crate::storage::writer::StorageWriter;
use crate::storage::{load_articles_for_date, ObjectStore, StorageLayout};
use crate::tagger::tables::TaggingTables;
use crate::tagger::Tagger;

/// Final phase: regenerate whatever is built from the day's articles.
#[async_trait]
pub trait IndexRenderer: Send + Sync {
    /// Returns the number of articles indexed.
    async fn render(&self, store: &dyn ObjectStore, layout: &StorageLayout) -> Result<usize>;
}

/// Reads the day's catalogue back and logs per-source counts.
pub struct LogIndexRenderer;

#[async_trait]
impl IndexRenderer for LogIndexRenderer {
    async fn render(&self, store: &dyn ObjectStore, layout: &StorageLayout) -> Result<usize> {
        let articles = load_articles_for_date(store, layout).await?;
        let mut per_source: BTreeMap<&'static str, usize> = BTreeMap::new();
        for a in &articles {
            *per_source.entry(a.source.label()).or_default() += 1;
        }
        for (source, n) in &per_source {
            tracing::info!(prefix = %layout.date_prefix(), source, articles = n, "index");
        }
        Ok(articles.len())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    pub processor: &'static str,
    pub items: SourceReport,
    pub completed: usize,
    pub skipped_completed: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
}

impl PhaseSummary {
    fn count(&mut self, state: SourceState) {
        match state {
            SourceState::Completed => self.completed += 1,
            SourceState::SkippedCompleted => self.skipped_completed += 1,
            SourceState::SkippedInvalid => self.skipped_invalid += 1,
            SourceState::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub fresh: bool,
    pub phases: Vec<PhaseSummary>,
    pub indexed: Option<usize>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn totals(&self) -> SourceReport {
        let mut t = SourceReport::default();
        for p in &self.phases {
            t += p.items;
        }
        t
    }

    pub fn phase(&self, processor: &str) -> Option<&PhaseSummary> {
        self.phases.iter().find(|p| p.processor == processor)
    }

    pub fn log(&self) {
        for p in &self.phases {
            tracing::info!(
                processor = p.processor,
                fetched = p.items.fetched,
                skipped = p.items.skipped,
                saved = p.items.saved,
                write_failures = p.items.failed,
                sources_completed = p.completed,
                sources_resumed = p.skipped_completed,
                sources_invalid = p.skipped_invalid,
                sources_failed = p.failed,
                "phase done"
            );
        }
        let t = self.totals();
        tracing::info!(
            fresh = self.fresh,
            fetched = t.fetched,
            skipped = t.skipped,
            saved = t.saved,
            indexed = ?self.indexed,
            elapsed_s = self.elapsed.as_secs_f64(),
            "collection run complete"
        );
    }
}

/// Processors in phase order.
pub fn processors(config: &RunConfig) -> Result<Vec<Box<dyn SourceProcessor>>> {
    let news = keyword_set(&config.news_keywords).context("building news keyword set")?;
    let political = keyword_set(&config.political_keywords).context("building political keyword set")?;
    let list: Vec<Box<dyn SourceProcessor>> = vec![
        Box::new(RssNewsProcessor::new(
            config.sources.rss.clone(),
            news.clone(),
            config.min_year,
            config.item_delay(),
        )),
        Box::new(DirectScrapeProcessor::new(
            config.sources.direct.clone(),
            news,
            config.min_year,
            config.max_direct_articles,
            config.direct_item_delay(),
        )),
        Box::new(LegislationProcessor::new(
            config.sources.legislation.clone(),
            config.item_delay(),
        )),
        Box::new(PolymarketProcessor::new(config.polymarket.clone(), political)),
    ];
    Ok(list)
}

async fn run_source(
    processor: &dyn SourceProcessor,
    source: &str,
    pipeline: &Pipeline,
    progress: &ProgressTracker,
) -> (SourceState, SourceReport) {
    if progress.is_complete(source) {
        tracing::info!(target: "ingest", processor = processor.name(), %source, "already completed, skipping");
        return (SourceState::SkippedCompleted, SourceReport::default());
    }
    match processor.process_source(source, pipeline, progress).await {
        Ok(report) => {
            if let Err(e) = progress.add_articles(report.saved as u64) {
                tracing::warn!(%source, error = ?e, "could not persist article count");
            }
            // A failed write must be retried next run, so the source stays open.
            if report.failed > 0 {
                tracing::warn!(
                    target: "ingest",
                    processor = processor.name(),
                    %source,
                    write_failures = report.failed,
                    "storage writes failed, source left pending"
                );
                return (SourceState::Failed, report);
            }
            if let Err(e) = progress.mark_complete(source) {
                tracing::warn!(%source, error = ?e, "could not persist source completion");
            }
            tracing::info!(
                target: "ingest",
                processor = processor.name(),
                %source,
                fetched = report.fetched,
                saved = report.saved,
                "source completed"
            );
            (SourceState::Completed, report)
        }
        Err(e) => {
            counter!("collector_source_errors_total", "processor" => processor.name()).increment(1);
            tracing::warn!(target: "ingest", processor = processor.name(), %source, error = %e, "source failed");
            (e.terminal_state(), SourceReport::default())
        }
    }
}

async fn run_phase(processor: &dyn SourceProcessor, pipeline: &Pipeline, config: &RunConfig) -> Result<PhaseSummary> {
    let progress = ProgressTracker::open(
        &config.progress_dir,
        processor.name(),
        processor.category(),
        pipeline.layout.date,
        config.fresh,
    )?;
    let sources = processor.sources();
    tracing::info!(processor = processor.name(), sources = sources.len(), workers = config.workers, "phase start");

    let progress = &progress;
    let results: Vec<(SourceState, SourceReport)> = stream::iter(sources)
        .map(|source| async move {
            let out = run_source(processor, &source, pipeline, progress).await;
            pace(config.source_delay()).await;
            out
        })
        .buffer_unordered(config.workers)
        .collect()
        .await;

    let mut summary = PhaseSummary {
        processor: processor.name(),
        ..PhaseSummary::default()
    };
    for (state, report) in results {
        summary.count(state);
        summary.items += report;
    }
    Ok(summary)
}

/// Full run against explicit collaborators. Only failures outside any single
/// source (tables, progress files, an unreachable store) are returned.
pub async fn run_with(
    config: &RunConfig,
    http: Arc<dyn HttpFetch>,
    store: Arc<dyn ObjectStore>,
    renderer: &dyn IndexRenderer,
) -> Result<RunSummary> {
    ensure_metrics_described();
    let t0 = Instant::now();

    let tables = match &config.tagging_tables {
        Some(p) => TaggingTables::from_path(p)?,
        None => TaggingTables::default(),
    };
    let tagger = Arc::new(Tagger::new(&tables).context("building tagger")?);
    let layout = StorageLayout::new(config.collection_root.clone(), config.collection_date());

    let manifest = Arc::new(Manifest::new());
    if config.fresh {
        tracing::info!("fresh mode: dedup state ignored");
    } else {
        manifest
            .prime(store.as_ref(), &layout.date_prefix())
            .await
            .context("priming storage manifest")?;
    }

    let pipeline = Pipeline {
        http: http.clone(),
        extractor: Extractor::new(http, config.archive_base.clone()),
        tagger,
        writer: Arc::new(StorageWriter::new(store.clone(), manifest, config.fresh)),
        layout,
        collected_at: Utc::now(),
    };

    let mut summary = RunSummary {
        fresh: config.fresh,
        ..RunSummary::default()
    };
    for processor in processors(config)? {
        let phase = run_phase(processor.as_ref(), &pipeline, config).await?;
        summary.phases.push(phase);
    }

    match renderer.render(store.as_ref(), &pipeline.layout).await {
        Ok(n) => summary.indexed = Some(n),
        Err(e) => tracing::error!(error = ?e, "index regeneration failed"),
    }

    summary.elapsed = t0.elapsed();
    gauge!("collector_last_run_ts").set(Utc::now().timestamp() as f64);
    summary.log();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FixtureFetcher;
    use crate::storage::MemoryStore;

    fn config(dir: &std::path::Path) -> RunConfig {
        let mut c = RunConfig::default();
        c.progress_dir = dir.to_path_buf();
        c.date = chrono::NaiveDate::from_ymd_opt(2025, 1, 6);
        c.item_delay_ms = 0;
        c.direct_item_delay_ms = 0;
        c.sources.rss = vec!["not a url".into()];
        c.sources.direct = vec![];
        c.sources.legislation = vec!["https://leg.test/feed".into()];
        c.polymarket.api_url = "https://pm.test/markets".into();
        c
    }

    #[tokio::test]
    async fn phases_run_in_order_and_failures_stay_local() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let http = Arc::new(FixtureFetcher::new());
        let store = Arc::new(MemoryStore::new());

        let summary = run_with(&cfg, http, store, &LogIndexRenderer).await.unwrap();
        let names: Vec<_> = summary.phases.iter().map(|p| p.processor).collect();
        assert_eq!(names, vec!["rss_news", "direct_scrape", "legislation", "polymarket"]);
        assert_eq!(summary.phase("rss_news").unwrap().skipped_invalid, 1);
        // unknown fixture URLs answer 404
        assert_eq!(summary.phase("legislation").unwrap().failed, 1);
        assert_eq!(summary.phase("polymarket").unwrap().failed, 1);
        assert_eq!(summary.totals().saved, 0);
        assert_eq!(summary.indexed, Some(0));
    }

    #[tokio::test]
    async fn non_feed_page_fails_the_source() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.sources.rss = vec!["https://news.test/rss".into()];
        let http = Arc::new(
            FixtureFetcher::new().with_page("https://news.test/rss", "<html><body>Service moved</body></html>"),
        );

        let summary = run_with(&cfg, http, Arc::new(MemoryStore::new()), &LogIndexRenderer)
            .await
            .unwrap();
        let rss = summary.phase("rss_news").unwrap();
        assert_eq!(rss.failed, 1);
        assert_eq!(rss.completed, 0);

        let progress =
            ProgressTracker::open(tmp.path(), "rss_news", "rss_feeds", cfg.collection_date(), false).unwrap();
        assert!(!progress.is_complete("https://news.test/rss"));
    }

    #[tokio::test]
    async fn unreachable_store_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_listing(true);
        let err = run_with(&config(tmp.path()), Arc::new(FixtureFetcher::new()), store, &LogIndexRenderer)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("priming storage manifest"));
    }
}
