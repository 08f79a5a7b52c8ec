// src/storage/writer.rs
//! At-most-once writes. `write_if_absent` is the only path to the store.

use anyhow::{Context, Result};
use metrics::counter;
use std::sync::Arc;

use super::manifest::Manifest;
use super::{article_id, sanitize_key, ObjectStore, StorageLayout};
use crate::model::{ArticleRecord, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Metadata and content both written by this call.
    Saved,
    /// One half existed already (an interrupted earlier attempt); the
    /// missing half was written now.
    Repaired,
    /// Both halves present; nothing written.
    AlreadyExists,
    /// Another worker holds a claim on one of the keys and may still fail.
    InFlight,
}

impl SaveOutcome {
    pub fn wrote_something(self) -> bool {
        matches!(self, SaveOutcome::Saved | SaveOutcome::Repaired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Exists,
    /// Another worker is writing the key right now.
    Claimed,
}

pub struct StorageWriter {
    store: Arc<dyn ObjectStore>,
    manifest: Arc<Manifest>,
    fresh: bool,
}

impl StorageWriter {
    pub fn new(store: Arc<dyn ObjectStore>, manifest: Arc<Manifest>, fresh: bool) -> Self {
        Self {
            store,
            manifest,
            fresh,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Manifest first; on a miss ask the store (skipped in fresh mode) and
    /// cache a positive answer.
    pub async fn exists(&self, key: &str) -> bool {
        let key = sanitize_key(key);
        if self.manifest.contains_key(&key) {
            return true;
        }
        if self.fresh {
            return false;
        }
        match self.store.exists(&key).await {
            Ok(true) => {
                self.manifest.insert_key(&key);
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::warn!(target: "storage", %key, error = ?e, "existence check failed, assuming absent");
                false
            }
        }
    }

    /// Write `bytes` under `key` unless the key is known to exist or another
    /// worker is writing it.
    pub async fn write_if_absent(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<WriteStatus> {
        let key = sanitize_key(key);
        if self.exists(&key).await {
            tracing::debug!(target: "storage", %key, "skip write, exists");
            return Ok(WriteStatus::Exists);
        }
        if !self.manifest.try_claim(&key) {
            // A committed key would have been caught above, unless it landed
            // between the two checks.
            if self.manifest.contains_key(&key) {
                return Ok(WriteStatus::Exists);
            }
            tracing::debug!(target: "storage", %key, "skip write, claimed elsewhere");
            return Ok(WriteStatus::Claimed);
        }
        match self.store.put(&key, bytes, content_type).await {
            Ok(()) => {
                self.manifest.commit(&key);
                tracing::debug!(target: "storage", %key, "written");
                Ok(WriteStatus::Written)
            }
            Err(e) => {
                self.manifest.release(&key);
                counter!("collector_write_failures_total").increment(1);
                Err(e).with_context(|| format!("writing {key}"))
            }
        }
    }

    /// Both halves of the article are present.
    pub async fn article_stored(&self, layout: &StorageLayout, kind: SourceType, url: &str) -> bool {
        let id = article_id(url);
        self.exists(&layout.metadata_key(kind, &id)).await
            && self.exists(&layout.content_key(kind, &id)).await
    }

    /// Metadata first, then content. Either write failing is an error and
    /// leaves the other half for the next run to repair.
    pub async fn save_article(&self, layout: &StorageLayout, rec: &ArticleRecord) -> Result<SaveOutcome> {
        let id = article_id(&rec.url);
        let meta_key = layout.metadata_key(rec.source_type, &id);
        let content_key = layout.content_key(rec.source_type, &id);

        let meta_present = self.exists(&meta_key).await;
        let content_present = self.exists(&content_key).await;
        if meta_present && content_present {
            return Ok(SaveOutcome::AlreadyExists);
        }

        let mut meta = WriteStatus::Exists;
        if !meta_present {
            let json = serde_json::to_vec_pretty(&rec.metadata()).context("serializing metadata")?;
            meta = self.write_if_absent(&meta_key, json, "application/json").await?;
        }
        let mut content = WriteStatus::Exists;
        if !content_present {
            content = self
                .write_if_absent(&content_key, rec.content.as_bytes().to_vec(), "text/html")
                .await?;
        }

        use WriteStatus::*;
        Ok(match (meta, content) {
            (Claimed, _) | (_, Claimed) => SaveOutcome::InFlight,
            (Written, Written) => SaveOutcome::Saved,
            (Exists, Exists) => SaveOutcome::AlreadyExists,
            _ => SaveOutcome::Repaired,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tags;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn layout() -> StorageLayout {
        StorageLayout::new("news", NaiveDate::from_ymd_opt(2025, 1, 6).unwrap())
    }

    fn record(url: &str) -> ArticleRecord {
        ArticleRecord {
            title: "Title".into(),
            url: url.into(),
            pub_date: "2025-01-06".into(),
            description: "desc".into(),
            content: "<p>body</p>".into(),
            source_type: SourceType::RssFeed,
            feed_url: "https://feed.test/rss".into(),
            collection_date: chrono::Utc::now(),
            tags: Tags::default(),
        }
    }

    fn writer(store: Arc<MemoryStore>, fresh: bool) -> StorageWriter {
        StorageWriter::new(store, Arc::new(Manifest::new()), fresh)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_reach_store_once() {
        let store = Arc::new(MemoryStore::new().with_put_delay(Duration::from_millis(20)));
        let w = Arc::new(writer(store.clone(), false));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let w = w.clone();
            handles.push(tokio::spawn(async move {
                w.write_if_absent("news/k.html", b"x".to_vec(), "text/html").await.unwrap()
            }));
        }
        let mut written = 0;
        for h in handles {
            if h.await.unwrap() == WriteStatus::Written {
                written += 1;
            }
        }
        assert_eq!(written, 1);
        assert_eq!(store.put_count(), 1);
        assert_eq!(w.manifest().key_count(), 1);
    }

    #[tokio::test]
    async fn save_writes_both_then_reports_existing() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(store.clone(), false);
        let rec = record("https://a.test/1");
        assert_eq!(w.save_article(&layout(), &rec).await.unwrap(), SaveOutcome::Saved);
        assert_eq!(w.save_article(&layout(), &rec).await.unwrap(), SaveOutcome::AlreadyExists);
        assert_eq!(store.put_count(), 2);

        let id = article_id(&rec.url);
        let meta_key = layout().metadata_key(SourceType::RssFeed, &id);
        assert_eq!(store.content_type(&meta_key).as_deref(), Some("application/json"));
        let meta: serde_json::Value =
            serde_json::from_slice(&store.get(&meta_key).await.unwrap().unwrap()).unwrap();
        assert_eq!(meta["url"], "https://a.test/1");
    }

    #[tokio::test]
    async fn missing_content_is_repaired() {
        let store = Arc::new(MemoryStore::new());
        let rec = record("https://a.test/2");
        let id = article_id(&rec.url);
        store.seed(&layout().metadata_key(SourceType::RssFeed, &id), "{}");

        let w = writer(store.clone(), false);
        assert!(!w.article_stored(&layout(), SourceType::RssFeed, &rec.url).await);
        assert_eq!(w.save_article(&layout(), &rec).await.unwrap(), SaveOutcome::Repaired);
        assert_eq!(store.put_count(), 1);
        assert!(w.article_stored(&layout(), SourceType::RssFeed, &rec.url).await);
    }

    #[tokio::test]
    async fn failed_content_write_is_an_error_and_releases_claim() {
        let store = Arc::new(MemoryStore::new());
        store.fail_puts_under(Some("news/2025-01-06/rss/content/"));
        let w = writer(store.clone(), false);
        let rec = record("https://a.test/3");
        assert!(w.save_article(&layout(), &rec).await.is_err());

        store.fail_puts_under(None);
        assert_eq!(w.save_article(&layout(), &rec).await.unwrap(), SaveOutcome::Repaired);
    }

    #[tokio::test]
    async fn claimed_key_is_reported_in_flight() {
        let store = Arc::new(MemoryStore::new());
        let w = writer(store.clone(), false);
        let rec = record("https://a.test/5");
        let content_key = layout().content_key(SourceType::RssFeed, &article_id(&rec.url));
        assert!(w.manifest().try_claim(&content_key));

        assert_eq!(w.save_article(&layout(), &rec).await.unwrap(), SaveOutcome::InFlight);
        assert!(!SaveOutcome::InFlight.wrote_something());

        // the other worker's write failed; the next attempt completes it
        w.manifest().release(&content_key);
        assert_eq!(w.save_article(&layout(), &rec).await.unwrap(), SaveOutcome::Repaired);
    }

    #[tokio::test]
    async fn fresh_mode_ignores_store_state() {
        let store = Arc::new(MemoryStore::new());
        let rec = record("https://a.test/4");
        let id = article_id(&rec.url);
        store.seed(&layout().metadata_key(SourceType::RssFeed, &id), "{}");
        store.seed(&layout().content_key(SourceType::RssFeed, &id), "old");

        let w = writer(store.clone(), true);
        assert_eq!(w.save_article(&layout(), &rec).await.unwrap(), SaveOutcome::Saved);
        // within the run the manifest still stops a second write
        assert_eq!(w.save_article(&layout(), &rec).await.unwrap(), SaveOutcome::AlreadyExists);
        assert_eq!(store.put_count(), 2);
    }
}
