//! Source loading
//!
//! Turns a [`SourceLocation`] into raw text for an extractor. Timeouts and
//! status handling live here; extractors never touch the network or disk.

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::source::SourceLocation;

/// Default HTTP timeout for fetching remote sources
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("tabflow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Fetches the raw content of a source (dependency injection seam).
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, location: &SourceLocation) -> Result<String, LoadError>;
}

/// Reads files with `tokio::fs` and fetches URLs with `reqwest`.
#[derive(Debug, Clone)]
pub struct DefaultLoader {
    client: Client,
}

impl DefaultLoader {
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<String, LoadError> {
        info!(url = %url, "Fetching source");

        let response = self.client.get(url).send().await.map_err(|e| LoadError::Http {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|e| LoadError::Http {
            url: url.to_string(),
            source: e,
        })?;
        debug!(url = %url, bytes = body.len(), "Fetched source");
        Ok(body)
    }
}

#[async_trait]
impl SourceLoader for DefaultLoader {
    async fn load(&self, location: &SourceLocation) -> Result<String, LoadError> {
        match location {
            SourceLocation::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| LoadError::Read {
                    path: path.clone(),
                    source: e,
                })?;
                debug!(path = %path.display(), bytes = text.len(), "Read source file");
                Ok(text)
            },
            SourceLocation::Url(url) => self.fetch(url).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        std::fs::write(&path, "Currency,Rate\nEUR,0.93\n").unwrap();

        let loader = DefaultLoader::new(Duration::from_secs(5)).unwrap();
        let text = loader.load(&SourceLocation::File(path)).await.unwrap();
        assert!(text.starts_with("Currency,Rate"));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DefaultLoader::new(Duration::from_secs(5)).unwrap();

        let err = loader
            .load(&SourceLocation::File(dir.path().join("absent.csv")))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }
}
