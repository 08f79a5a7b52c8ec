//! Batch entry point for scheduled jobs: no argument parsing, the fresh
//! switch comes from `FRESH_MODE` only. Exits non-zero on a fatal run error.

use news_collector::{config, init_tracing, run, RunConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut cfg = RunConfig::load_default()?;
    cfg.fresh = cfg.fresh || config::fresh_from_env();

    let summary = run(cfg).await.inspect_err(|e| {
        tracing::error!(error = ?e, "collection run failed");
    })?;
    let t = summary.totals();
    tracing::info!(saved = t.saved, elapsed_s = summary.elapsed.as_secs_f64(), "batch done");
    Ok(())
}
