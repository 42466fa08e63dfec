//! Content normalization: inbound email → ordered multi-modal parts.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::channels::attachments::AttachmentFetcher;
use crate::error::PipelineError;
use crate::llm::ContentPart;
use crate::pipeline::types::{AttachmentRef, InboundEmail};

/// Turns an [`InboundEmail`] into the user turn of a completion request.
///
/// Output order: the text part (if any), then one image part per image
/// attachment in payload order. Non-image attachments are dropped.
pub struct ContentNormalizer {
    fetcher: Arc<dyn AttachmentFetcher>,
    concurrency: usize,
}

impl ContentNormalizer {
    /// Downloads one attachment at a time.
    pub fn new(fetcher: Arc<dyn AttachmentFetcher>) -> Self {
        Self {
            fetcher,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` downloads in flight (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn normalize(&self, email: &InboundEmail) -> Result<Vec<ContentPart>, PipelineError> {
        let mut parts = Vec::with_capacity(1 + email.attachments().len());

        if email.has_text() {
            parts.push(ContentPart::text(email.stripped_text()));
        }

        let images: Vec<(usize, AttachmentRef)> = email
            .attachments()
            .iter()
            .enumerate()
            .filter(|(_, attachment)| {
                let keep = attachment.is_image();
                if !keep {
                    debug!(
                        name = %attachment.name,
                        content_type = %attachment.content_type,
                        "Skipping non-image attachment"
                    );
                }
                keep
            })
            .map(|(index, attachment)| (index, attachment.clone()))
            .collect();

        // Downloads may finish out of order; the payload index restores it.
        let mut fetched: Vec<(usize, ContentPart)> = stream::iter(images)
            .map(|(index, attachment)| async move {
                self.fetch_image(&attachment).await.map(|part| (index, part))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;
        fetched.sort_by_key(|(index, _)| *index);
        parts.extend(fetched.into_iter().map(|(_, part)| part));

        if parts.is_empty() {
            return Err(PipelineError::Validation(
                "email has no text and no image attachments".into(),
            ));
        }

        Ok(parts)
    }

    async fn fetch_image(&self, attachment: &AttachmentRef) -> Result<ContentPart, PipelineError> {
        let bytes = self.fetcher.fetch(&attachment.url).await?;
        debug!(
            name = %attachment.name,
            declared_size = attachment.size,
            bytes = bytes.len(),
            "Encoding image attachment"
        );
        Ok(ContentPart::image(attachment.mime_type(), BASE64_STANDARD.encode(&bytes)))
    }
}
