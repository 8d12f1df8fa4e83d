//! Remote manifest fetching
//!
//! A fetch is one HTTP GET. Anything other than a 2xx response with a
//! non-empty body is a failure, and callers absorb failures rather than
//! propagating them.

use async_trait::async_trait;
use keeper_core::{parse_manifest, DesiredStateManifest, NetworkConfig};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Why a manifest fetch failed
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Empty response body from {url}")]
    EmptyBody { url: String },
}

/// Source of raw manifest documents
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch the document at `url`
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// [`ManifestFetcher`] backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpManifestFetcher {
    client: reqwest::Client,
}

impl HttpManifestFetcher {
    pub fn new(network: &NetworkConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(network.http_timeout())
            .user_agent(network.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        debug!("Fetching manifest from {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }

        Ok(body)
    }
}

/// Fetch and parse the manifest at `url`
///
/// Returns `None` when the fetch fails or the document is not a JSON object.
/// A document that parses but has no valid entries yields an empty manifest.
pub async fn fetch_manifest(
    fetcher: &dyn ManifestFetcher,
    url: &Url,
) -> Option<DesiredStateManifest> {
    let body = match fetcher.fetch(url).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to fetch manifest from {}: {}", url, e);
            return None;
        }
    };

    match parse_manifest(&body) {
        Ok(parsed) => Some(parsed.into_manifest()),
        Err(e) => {
            warn!("Discarding malformed manifest from {}: {}", url, e);
            None
        }
    }
}
