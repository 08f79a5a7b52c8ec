// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod storage;
pub mod tagger;

use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use crate::config::RunConfig;
pub use crate::orchestrator::{run_with, IndexRenderer, LogIndexRenderer, RunSummary};

pub const ENV_LOG_FORMAT: &str = "COLLECTOR_LOG_FORMAT";

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `COLLECTOR_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_collector=info,warn"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}

/// One collection run with the production collaborators: reqwest, the
/// filesystem store under `store_root` and the logging index renderer.
pub async fn run(config: RunConfig) -> anyhow::Result<RunSummary> {
    let http = Arc::new(fetch::ReqwestFetcher::new(config.http_timeout())?);
    let store = Arc::new(storage::FsStore::new(config.store_root.clone()));
    run_with(&config, http, store, &LogIndexRenderer).await
}
