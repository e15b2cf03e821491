//! Feed byte sources: HTTP endpoints and local snapshots.

pub mod auth;
mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::error::FetchError;

/// Produces the raw bytes of one feed snapshot.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError>;

    /// Where the bytes come from, for logs.
    fn describe(&self) -> String;
}

/// GETs `url` and returns the body. Any non-2xx status is an error.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &Url,
) -> Result<Vec<u8>, FetchError> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.clone());

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status,
            url: url.to_string(),
        });
    }

    let bytes = resp.bytes().await?.to_vec();
    debug!(bytes = bytes.len(), %status, "Feed body received");
    Ok(bytes)
}

pub struct HttpFeedSource<C> {
    client: C,
    url: Url,
}

impl<C: HttpClient> HttpFeedSource<C> {
    pub fn new(client: C, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl<C: HttpClient> FeedSource for HttpFeedSource<C> {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        fetch_bytes(&self.client, &self.url).await
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// Reads a previously saved `.pb` snapshot from disk.
pub struct FileFeedSource {
    path: PathBuf,
}

impl FileFeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileFeedSource {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
