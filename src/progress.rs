// src/progress.rs
//! Per-processor run progress, persisted after every change so an
//! interrupted run resumes at source granularity. One file per processor and
//! collection date; a new day starts from an empty record.
//!
//! File shape:
//! ```json
//! {"rss_feeds": {"completed": ["https://..."]},
//!  "total_articles": 12, "last_updated": "2025-01-06T10:00:00Z",
//!  "extraction_stats": {"successful_extractions": 3, ...}}
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    #[serde(default)]
    pub completed: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub successful_extractions: u64,
    pub failed_extractions: u64,
    pub site_specific_success: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub total_articles: u64,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub extraction_stats: ExtractionStats,
    #[serde(flatten)]
    pub categories: BTreeMap<String, CategoryProgress>,
}

pub struct ProgressTracker {
    path: PathBuf,
    category: String,
    record: Mutex<ProgressRecord>,
}

/// `<dir>/<processor>_<YYYY-MM-DD>_progress.json`
pub fn progress_path(dir: &Path, processor: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{processor}_{}_progress.json", date.format("%Y-%m-%d")))
}

impl ProgressTracker {
    /// Load the processor's record for `date`. Fresh mode deletes it first.
    /// An unreadable file is logged and replaced by an empty record.
    pub fn open(dir: &Path, processor: &str, category: &str, date: NaiveDate, fresh: bool) -> Result<Self> {
        let path = progress_path(dir, processor, date);
        let record = if fresh {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::info!(path = %path.display(), "fresh mode: progress cleared"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing {}", path.display()));
                }
            }
            ProgressRecord::default()
        } else {
            match std::fs::read_to_string(&path) {
                Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "progress file unreadable, starting empty");
                    ProgressRecord::default()
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProgressRecord::default(),
                Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
            }
        };
        Ok(Self {
            path,
            category: category.to_string(),
            record: Mutex::new(record),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ProgressRecord> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_complete(&self, source: &str) -> bool {
        self.lock()
            .categories
            .get(&self.category)
            .is_some_and(|c| c.completed.contains(source))
    }

    pub fn mark_complete(&self, source: &str) -> Result<()> {
        self.mutate(|r, category| {
            r.categories
                .entry(category.to_string())
                .or_default()
                .completed
                .insert(source.to_string());
        })
    }

    pub fn add_articles(&self, n: u64) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.mutate(|r, _| r.total_articles += n)
    }

    pub fn record_extraction_success(&self, site_specific: bool) -> Result<()> {
        self.mutate(|r, _| {
            r.extraction_stats.successful_extractions += 1;
            if site_specific {
                r.extraction_stats.site_specific_success += 1;
            }
        })
    }

    pub fn record_extraction_failure(&self) -> Result<()> {
        self.mutate(|r, _| r.extraction_stats.failed_extractions += 1)
    }

    pub fn snapshot(&self) -> ProgressRecord {
        self.lock().clone()
    }

    // Persisting under the lock keeps file writes in mutation order.
    fn mutate(&self, f: impl FnOnce(&mut ProgressRecord, &str)) -> Result<()> {
        let mut rec = self.lock();
        f(&mut rec, &self.category);
        rec.last_updated = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        save(&self.path, &rec)
    }
}

fn save(path: &Path, rec: &ProgressRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(rec).context("serializing progress")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
