//! Attachment download over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::PipelineError;

/// Retrieves the raw bytes behind an attachment URL.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Fails with [`PipelineError::Download`] on transport failure or a
    /// non-success status. Never retries.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

/// [`AttachmentFetcher`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpAttachmentFetcher {
    client: reqwest::Client,
}

impl HttpAttachmentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Download {
                url: url.to_string(),
                status: e.status().map(|s| s.as_u16()),
                reason: e.to_string(),
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(PipelineError::Download {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {status}"),
            });
        }

        let bytes = res.bytes().await.map_err(|e| PipelineError::Download {
            url: url.to_string(),
            status: Some(status.as_u16()),
            reason: format!("failed to read body: {e}"),
        })?;

        debug!(url, bytes = bytes.len(), "Downloaded attachment");
        Ok(bytes.to_vec())
    }
}
