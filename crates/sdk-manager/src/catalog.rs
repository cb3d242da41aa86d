//! Remote SDK catalog
//!
//! Queries the SDK store for available versions:
//! - `GET <base>/v1/files/sdk-core?channel=<c>` lists descriptors
//! - `GET <base>/v1/files/sdk-core/<version>?channel=<c>` returns one

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::downloader::{DownloadError, Downloader};

/// A remote SDK descriptor.
///
/// The store signals an unknown version by omitting `version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteSdk {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

impl RemoteSdk {
    pub fn is_found(&self) -> bool {
        self.version.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct FileListing {
    #[serde(default)]
    files: Vec<RemoteSdk>,
}

/// Client for the remote SDK store
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    base_url: String,
    downloader: Downloader,
}

impl RemoteCatalog {
    pub fn new(base_url: &str, downloader: Downloader) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            downloader,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL extended by `segments`, each escaped as a single path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, DownloadError> {
        let invalid = || DownloadError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        channel: &str,
    ) -> Result<T, DownloadError> {
        let url = self.endpoint(segments)?;
        debug!("Querying {} (channel '{}')", url, channel);

        let response = self
            .downloader
            .client()
            .get(url.clone())
            .query(&[("channel", channel)])
            .timeout(self.downloader.idle_timeout())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownloadError::InvalidResponse {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    /// Versions available on a channel
    pub async fn list_available(&self, channel: &str) -> Result<Vec<RemoteSdk>, DownloadError> {
        let listing: FileListing = self.get_json(&["v1", "files", "sdk-core"], channel).await?;
        Ok(listing.files)
    }

    /// Descriptor for one version; check [`RemoteSdk::is_found`]
    pub async fn fetch(&self, version: &str, channel: &str) -> Result<RemoteSdk, DownloadError> {
        self.get_json(&["v1", "files", "sdk-core", version], channel)
            .await
    }

    /// Toolchain archive URL for an SDK version and host platform
    pub fn toolchain_url(&self, version: &str, platform: &str) -> Result<String, DownloadError> {
        let archive = format!("toolchain-{}.tar.gz", platform);
        Ok(self.endpoint(&["releases", version, archive.as_str()])?.to_string())
    }
}
