// src/storage/mod.rs
//! Object store abstraction and the deterministic key layout.
//!
//! `<root>/<date>/<kind>/metadata/<md5(url)>.json`
//! `<root>/<date>/<kind>/content/<md5(url)>.html`

pub mod manifest;
pub mod writer;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::model::{ArticleMetadata, SourceType};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn exists(&self, key: &str) -> Result<bool>;
    /// Every key starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Deterministic article id: hex md5 of the URL.
pub fn article_id(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

/// Clean the last path segment of a key; directories are left alone.
pub fn sanitize_key(key: &str) -> String {
    static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    static BAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w.\-]").unwrap());

    let (dir, file) = match key.rfind('/') {
        Some(i) => (&key[..=i], &key[i + 1..]),
        None => ("", key),
    };
    let file = file.trim().replace('\\', "_");
    let file = WS.replace_all(&file, "_");
    let file = BAD.replace_all(&file, "_");
    format!("{dir}{file}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub root: String,
    pub date: NaiveDate,
}

impl StorageLayout {
    pub fn new(root: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            root: root.into().trim_end_matches('/').to_string(),
            date,
        }
    }

    /// `<root>/<YYYY-MM-DD>/`
    pub fn date_prefix(&self) -> String {
        format!("{}/{}/", self.root, self.date.format("%Y-%m-%d"))
    }

    pub fn kind_prefix(&self, kind: SourceType) -> String {
        format!("{}{}/", self.date_prefix(), kind.segment())
    }

    pub fn metadata_key(&self, kind: SourceType, id: &str) -> String {
        format!("{}metadata/{id}.json", self.kind_prefix(kind))
    }

    pub fn content_key(&self, kind: SourceType, id: &str) -> String {
        format!("{}content/{id}.html", self.kind_prefix(kind))
    }
}

pub fn is_metadata_key(key: &str) -> bool {
    key.contains("/metadata/") && key.ends_with(".json")
}

/// Content key stored alongside a metadata key.
pub fn content_key_for(metadata_key: &str) -> Option<String> {
    let i = metadata_key.rfind("/metadata/")?;
    let stem = metadata_key.strip_suffix(".json")?;
    Some(format!("{}/content/{}.html", &metadata_key[..i], &stem[i + "/metadata/".len()..]))
}

/// Read back every metadata object stored for the layout's date.
pub async fn load_articles_for_date(
    store: &dyn ObjectStore,
    layout: &StorageLayout,
) -> Result<Vec<ArticleMetadata>> {
    let keys = store
        .list(&layout.date_prefix())
        .await
        .with_context(|| format!("listing {}", layout.date_prefix()))?;
    let mut out = Vec::new();
    for key in keys.iter().filter(|k| is_metadata_key(k)) {
        match store.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<ArticleMetadata>(&bytes) {
                Ok(m) => out.push(m),
                Err(e) => tracing::warn!(target: "storage", %key, error = %e, "unreadable metadata"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(target: "storage", %key, error = ?e, "metadata read failed"),
        }
    }
    Ok(out)
}

/// Local directory standing in for a bucket. Writes land in a temporary
/// sibling first and are renamed into place.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|seg| seg == "..") {
            return Err(anyhow!("refusing key with parent segment: {key}"));
        }
        Ok(self.root.join(key.trim_start_matches('/')))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp = PathBuf::from(format!("{}.partial", path.display()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("moving {} into place", path.display()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("stat {}", path.display()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // List the deepest directory named by the prefix, then filter.
        let dir_part = match prefix.rfind('/') {
            Some(i) => &prefix[..i],
            None => "",
        };
        let start = self.path_for(dir_part)?;
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(dir) = stack.pop() {
            let mut rd = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
            };
            while let Some(entry) = rd
                .next_entry()
                .await
                .with_context(|| format!("listing {}", dir.display()))?
            {
                let path = entry.path();
                let ft = entry.file_type().await?;
                if ft.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|e| e == "partial") {
                    continue;
                } else if let Some(key) = self.key_for(&path) {
                    if key.starts_with(prefix) {
                        out.push(key);
                    }
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

// --- Test helper ---

/// In-memory store. Counts puts, can be told to fail writes under a prefix
/// or to stall each put so concurrent writers interleave.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
    puts: AtomicUsize,
    fail_prefix: Mutex<Option<String>>,
    fail_list: Mutex<bool>,
    put_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_put_delay(self, d: Duration) -> Self {
        if let Ok(mut slot) = self.put_delay.lock() {
            *slot = Some(d);
        }
        self
    }

    pub fn fail_puts_under(&self, prefix: Option<&str>) {
        if let Ok(mut slot) = self.fail_prefix.lock() {
            *slot = prefix.map(str::to_string);
        }
    }

    pub fn fail_listing(&self, on: bool) {
        if let Ok(mut slot) = self.fail_list.lock() {
            *slot = on;
        }
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Seed an object without counting it as a put.
    pub fn seed(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut m) = self.objects.lock() {
            m.insert(key.to_string(), (bytes.into(), String::new()));
        }
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .ok()
            .and_then(|m| m.get(key).map(|(_, ct)| ct.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let delay = self.put_delay.lock().ok().and_then(|d| *d);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let failing = self
            .fail_prefix
            .lock()
            .ok()
            .and_then(|p| p.clone())
            .is_some_and(|p| key.starts_with(&p));
        if failing {
            return Err(anyhow!("injected put failure for {key}"));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut m = self
            .objects
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))?;
        m.insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let m = self
            .objects
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(m.get(key).map(|(b, _)| b.clone()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let m = self
            .objects
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(m.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if self.fail_list.lock().map(|f| *f).unwrap_or(false) {
            return Err(anyhow!("injected listing failure"));
        }
        let m = self
            .objects
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(m.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}
