//! Archive Downloader
//!
//! Streams SDK and toolchain archives into anonymous scratch files.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{info, debug};

/// Download progress callback: (bytes received, total bytes or 0 if unknown)
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Download error types
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid response from {url}: HTTP {status}")]
    InvalidResponse { url: String, status: u16 },
    #[error("Invalid URL {0}")]
    InvalidUrl(String),
    #[error("No data from {url} for {secs}s")]
    Stalled { url: String, secs: u64 },
}

/// Streaming HTTP downloader
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    idle_timeout: Duration,
}

impl Downloader {
    /// Create a downloader that gives up on a connection once it has been
    /// silent for `timeout_secs`. A download that keeps receiving data may
    /// take as long as it needs.
    pub fn new(timeout_secs: u64) -> Result<Self, DownloadError> {
        let idle_timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder().connect_timeout(idle_timeout).build()?;

        Ok(Self { client, idle_timeout })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn stalled(&self, url: &str) -> DownloadError {
        DownloadError::Stalled {
            url: url.to_string(),
            secs: self.idle_timeout.as_secs(),
        }
    }

    /// Download `url` into a fresh temporary file, rewound to the start.
    ///
    /// The file has no name on disk and disappears once dropped, whether
    /// the caller succeeds or not.
    pub async fn download_to_temp(
        &self,
        url: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<File, DownloadError> {
        info!("Downloading {}", url);

        let response = tokio::time::timeout(self.idle_timeout, self.client.get(url).send())
            .await
            .map_err(|_| self.stalled(url))??;

        if !response.status().is_success() {
            return Err(DownloadError::InvalidResponse {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total_size = response.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;

        let mut file = tokio::fs::File::from_std(tempfile::tempfile()?);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = tokio::time::timeout(self.idle_timeout, stream.next())
            .await
            .map_err(|_| self.stalled(url))?
        {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let Some(callback) = progress {
                callback(downloaded, total_size);
            }
        }

        file.flush().await?;
        let mut file = file.into_std().await;
        file.seek(SeekFrom::Start(0))?;

        debug!("Downloaded {} bytes from {}", downloaded, url);
        Ok(file)
    }
}
