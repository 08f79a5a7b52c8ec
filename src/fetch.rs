// src/fetch.rs
//! Outbound HTTP behind a small trait so processors and the extractor can be
//! driven by canned pages in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("failed reading body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// 401/403/404: the resource is not coming back on its own.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::Status { status, .. } if matches!(status, 401 | 403 | 404))
    }

    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Network { .. } => true,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::Body { .. } => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub url: String,
    pub body: String,
}

#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// GET `url`. Non-2xx responses are returned as [`FetchError::Status`].
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Log a failed fetch at the severity its class deserves.
pub fn log_fetch_failure(err: &FetchError, what: &str) {
    if err.is_permanent() {
        tracing::warn!(target: "fetch", error = %err, permanent = true, "{what} unavailable");
    } else if err.is_transient() {
        tracing::warn!(target: "fetch", error = %err, transient = true, "{what} failed");
    } else {
        tracing::warn!(target: "fetch", error = %err, "{what} failed");
    }
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;
        use reqwest::header::{self, HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

fn classify_reqwest(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest(url, e))?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;
        Ok(FetchedPage {
            status,
            url: final_url,
            body,
        })
    }
}

// --- Test helper ---

/// Serves canned responses by exact URL and counts every request.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct FixtureFetcher {
    pages: Mutex<HashMap<String, (u16, String)>>,
    hits: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, body: impl Into<String>) -> Self {
        self.insert(url, 200, body);
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.insert(url, status, String::new());
        self
    }

    pub fn insert(&self, url: &str, status: u16, body: impl Into<String>) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(url.to_string(), (status, body.into()));
        }
    }

    /// Every requested URL, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.hits.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn hits(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl HttpFetch for FixtureFetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if let Ok(mut hits) = self.hits.lock() {
            hits.push(url.to_string());
        }
        let found = self
            .pages
            .lock()
            .ok()
            .and_then(|p| p.get(url).cloned());
        match found {
            Some((status, body)) if (200..300).contains(&status) => Ok(FetchedPage {
                status,
                url: url.to_string(),
                body,
            }),
            Some((status, _)) => Err(FetchError::Status {
                status,
                url: url.to_string(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        let s = |status| FetchError::Status {
            status,
            url: "u".into(),
        };
        assert!(s(404).is_permanent());
        assert!(s(401).is_permanent());
        assert!(!s(400).is_permanent());
        assert!(!s(400).is_transient());
        assert!(s(503).is_transient());
        assert!(FetchError::Timeout { url: "u".into() }.is_transient());
    }

    #[tokio::test]
    async fn fixture_fetcher_counts_and_defaults_to_404() {
        let f = FixtureFetcher::new()
            .with_page("https://a.test/", "<p>hi</p>")
            .with_status("https://a.test/gone", 410);
        assert_eq!(f.get("https://a.test/").await.unwrap().body, "<p>hi</p>");
        assert_eq!(f.get("https://a.test/gone").await.unwrap_err().status(), Some(410));
        assert_eq!(f.get("https://a.test/x").await.unwrap_err().status(), Some(404));
        assert_eq!(f.hits("https://a.test/"), 1);
        assert_eq!(f.requests().len(), 3);
    }
}
