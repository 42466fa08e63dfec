//! Bridges a rig `CompletionModel` to [`LlmProvider`].

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, ImageMediaType, Message, MimeType, UserContent};
use rig::one_or_many::OneOrMany;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, ContentPart, LlmProvider, TokenUsage,
};

/// Wraps any rig completion model behind the crate's provider trait.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
    timeout: Option<Duration>,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
            timeout: None,
        }
    }

    /// Bound each completion call. rig clients carry no deadline of their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn failed(&self, reason: impl Into<String>) -> LlmError {
        LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let content = OneOrMany::many(request.parts.iter().map(user_content).collect::<Vec<_>>())
            .map_err(|_| self.failed("completion request has no content parts"))?;

        debug!(
            model = %self.model_name,
            parts = request.parts.len(),
            "Sending completion request"
        );

        let mut builder = self
            .model
            .completion_request(Message::User { content })
            .preamble(request.system_prompt);
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, builder.send())
                .await
                .map_err(|_| self.failed(format!("timed out after {}s", limit.as_secs())))?,
            None => builder.send().await,
        }
        .map_err(|e| self.failed(e.to_string()))?;

        let text = response.choice.iter().find_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text.clone()),
            _ => None,
        });

        Ok(CompletionResponse {
            text,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}

/// Convert one content part into rig's user content.
///
/// Image types rig does not recognize are sent without a media type and
/// left for the provider to accept or reject.
pub(crate) fn user_content(part: &ContentPart) -> UserContent {
    match part {
        ContentPart::Text { value } => UserContent::text(value.clone()),
        ContentPart::Image { media_type, data } => UserContent::image_base64(
            data.clone(),
            ImageMediaType::from_mime_type(media_type),
            None,
        ),
    }
}
