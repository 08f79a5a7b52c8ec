//! Collector CLI entry point.
//! Runs one collection pass; `--fresh` (or `FRESH_MODE`) ignores prior state.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use news_collector::{config, init_tracing, run, RunConfig};

#[derive(Debug, Parser)]
#[command(name = "news-collector", about = "Collect, tag and store news, legislation and market items")]
struct Cli {
    /// Reprocess everything: skip dedup state and clear progress files.
    #[arg(long, alias = "fresh-mode")]
    fresh: bool,

    /// TOML config file (overrides $COLLECTOR_CONFIG_PATH).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(p) => RunConfig::load_from(p)?,
        None => RunConfig::load_default()?,
    };
    cfg.fresh = cfg.fresh || cli.fresh || config::fresh_from_env();
    tracing::info!(fresh = cfg.fresh, date = %cfg.collection_date(), "starting collection");

    tokio::select! {
        res = run(cfg) => {
            let summary = res?;
            let t = summary.totals();
            println!(
                "fetched {} / skipped {} / saved {} in {:.1}s",
                t.fetched,
                t.skipped,
                t.saved,
                summary.elapsed.as_secs_f64()
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; completed sources and written articles are kept, rerun to resume");
        }
    }
    Ok(())
}
