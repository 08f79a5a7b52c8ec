// src/storage/manifest.rs
//! In-memory cache of stored keys and processed URLs for one run.
//!
//! The object store stays authoritative; this only saves round trips. Keys
//! are added right after a successful write, and a key being written is
//! held "in flight" so two workers cannot both write it.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use super::{content_key_for, is_metadata_key, ObjectStore};

#[derive(Default)]
struct State {
    keys: HashSet<String>,
    in_flight: HashSet<String>,
    urls: HashSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimeStats {
    pub keys: usize,
    pub urls: usize,
}

#[derive(Default)]
pub struct Manifest {
    state: Mutex<State>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic mid-insert cannot leave the sets half-updated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// List everything under `prefix`, remember the keys and read back the
    /// `url` of every metadata object whose content is also stored. A URL
    /// with only its metadata is left unprocessed so the write is repaired.
    /// A listing failure means the store is unreachable and is returned.
    pub async fn prime(&self, store: &dyn ObjectStore, prefix: &str) -> Result<PrimeStats> {
        let keys = store
            .list(prefix)
            .await
            .with_context(|| format!("listing object store prefix {prefix}"))?;

        let listed: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let mut urls = Vec::new();
        for key in keys.iter().filter(|k| is_metadata_key(k)) {
            let complete = content_key_for(key).is_some_and(|c| listed.contains(c.as_str()));
            if !complete {
                tracing::debug!(target: "storage", %key, "content missing, url left for repair");
                continue;
            }
            match store.get(key).await {
                Ok(Some(bytes)) => {
                    let url = serde_json::from_slice::<serde_json::Value>(&bytes)
                        .ok()
                        .and_then(|v| v.get("url").and_then(|u| u.as_str()).map(str::to_string));
                    match url {
                        Some(u) if !u.is_empty() => urls.push(u),
                        _ => tracing::debug!(target: "storage", %key, "metadata without url"),
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(target: "storage", %key, error = ?e, "could not read metadata while priming"),
            }
        }

        let mut st = self.state();
        st.keys.extend(keys.iter().cloned());
        st.urls.extend(urls);
        let stats = PrimeStats {
            keys: st.keys.len(),
            urls: st.urls.len(),
        };
        tracing::info!(target: "storage", prefix, keys = stats.keys, urls = stats.urls, "manifest primed");
        Ok(stats)
    }

    pub fn already_processed(&self, url: &str) -> bool {
        self.state().urls.contains(url)
    }

    pub fn mark_processed(&self, url: &str) {
        self.state().urls.insert(url.to_string());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state().keys.contains(key)
    }

    /// Record a key confirmed present by the store itself.
    pub fn insert_key(&self, key: &str) {
        self.state().keys.insert(key.to_string());
    }

    /// Reserve `key` for writing. False when it is known or someone else
    /// holds it.
    pub fn try_claim(&self, key: &str) -> bool {
        let mut st = self.state();
        if st.keys.contains(key) || st.in_flight.contains(key) {
            return false;
        }
        st.in_flight.insert(key.to_string());
        true
    }

    /// The claimed write succeeded.
    pub fn commit(&self, key: &str) {
        let mut st = self.state();
        st.in_flight.remove(key);
        st.keys.insert(key.to_string());
    }

    /// The claimed write failed; let a later attempt try again.
    pub fn release(&self, key: &str) {
        self.state().in_flight.remove(key);
    }

    pub fn key_count(&self) -> usize {
        self.state().keys.len()
    }

    pub fn url_count(&self) -> usize {
        self.state().urls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn prime_reads_urls_from_metadata() {
        let store = MemoryStore::new();
        store.seed(
            "news/2025-01-06/rss/metadata/a.json",
            r#"{"url":"https://a.test/1","title":"x"}"#,
        );
        store.seed("news/2025-01-06/rss/content/a.html", "body");
        store.seed("news/2025-01-06/rss/metadata/broken.json", "not json");
        store.seed("news/2025-01-06/rss/content/broken.html", "body");
        store.seed("news/2025-01-06/rss/metadata/half.json", r#"{"url":"https://a.test/half"}"#);
        store.seed("news/2025-01-05/rss/metadata/old.json", r#"{"url":"https://a.test/old"}"#);

        let m = Manifest::new();
        let stats = m.prime(&store, "news/2025-01-06/").await.unwrap();
        assert_eq!(stats, PrimeStats { keys: 5, urls: 1 });
        assert!(m.already_processed("https://a.test/1"));
        // metadata without content is repaired, not skipped
        assert!(!m.already_processed("https://a.test/half"));
        assert!(m.contains_key("news/2025-01-06/rss/metadata/half.json"));
        assert!(!m.already_processed("https://a.test/old"));
        assert!(m.contains_key("news/2025-01-06/rss/content/a.html"));
    }

    #[tokio::test]
    async fn prime_surfaces_listing_failure() {
        let store = MemoryStore::new();
        store.fail_listing(true);
        assert!(Manifest::new().prime(&store, "news/").await.is_err());
    }

    #[test]
    fn claims_are_exclusive_until_released() {
        let m = Manifest::new();
        assert!(m.try_claim("k"));
        assert!(!m.try_claim("k"));
        m.release("k");
        assert!(m.try_claim("k"));
        m.commit("k");
        assert!(!m.try_claim("k"));
        assert!(m.contains_key("k"));
        assert_eq!(m.key_count(), 1);
    }
}
