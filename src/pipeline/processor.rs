//! Email reply pipeline: validate → normalize → generate → compose → dispatch.
//!
//! Each run is independent and strictly linear. Any failure ends the run
//! before dispatch, so a partial reply is never sent. A dispatch failure
//! means a completion was generated and then discarded.

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::channels::attachments::AttachmentFetcher;
use crate::channels::dispatch::MailDispatcher;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::llm::{CompletionRequest, ContentPart, LlmProvider};
use crate::pipeline::composer::compose;
use crate::pipeline::normalizer::ContentNormalizer;
use crate::pipeline::types::{InboundEmail, PipelineStage, ReplyEnvelope, WebhookPayload};

/// Fixed system instruction for reply generation.
pub const SYSTEM_PROMPT: &str = "You are a helpful email assistant. Read the email and \
     write a clear, friendly reply to the sender. If images are included, describe them and \
     incorporate their context into your reply.";

/// Orchestrates one inbound email into one dispatched reply.
///
/// The provider clients are injected and shared; the pipeline itself holds
/// no per-run state.
pub struct EmailReplyPipeline {
    llm: Arc<dyn LlmProvider>,
    dispatcher: Arc<dyn MailDispatcher>,
    normalizer: ContentNormalizer,
    config: PipelineConfig,
}

impl EmailReplyPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        fetcher: Arc<dyn AttachmentFetcher>,
        dispatcher: Arc<dyn MailDispatcher>,
        config: PipelineConfig,
    ) -> Self {
        let normalizer = ContentNormalizer::new(fetcher).with_concurrency(config.fetch_concurrency);
        Self {
            llm,
            dispatcher,
            normalizer,
            config,
        }
    }

    /// Process a raw webhook payload end to end.
    pub async fn process(&self, payload: WebhookPayload) -> Result<ReplyEnvelope, PipelineError> {
        let run_id = Uuid::new_v4();
        let sender = payload.sender.clone().unwrap_or_default();
        let span = info_span!("reply_pipeline", %run_id, %sender);

        async move {
            debug!(stage = PipelineStage::Validating.label(), "Validating inbound email");
            let email = InboundEmail::from_payload(payload)?;
            self.check_sender(&email)?;
            self.reply_to(&email).await
        }
        .instrument(span)
        .await
    }

    /// Process an already validated email.
    pub async fn reply_to(&self, email: &InboundEmail) -> Result<ReplyEnvelope, PipelineError> {
        debug!(
            stage = PipelineStage::Normalizing.label(),
            attachments = email.attachments().len(),
            "Normalizing content"
        );
        let parts = self.normalizer.normalize(email).await?;

        debug!(stage = PipelineStage::Generating.label(), parts = parts.len(), "Generating reply");
        let reply_text = self.generate(parts).await?;

        debug!(stage = PipelineStage::Composing.label(), "Composing reply");
        let envelope = compose(email, &reply_text);

        debug!(
            stage = PipelineStage::Dispatching.label(),
            dispatcher = self.dispatcher.name(),
            "Dispatching reply"
        );
        if let Err(e) = self.dispatcher.send(&envelope).await {
            warn!(
                to = %envelope.to,
                reply_chars = envelope.body.len(),
                "Generated reply was not delivered"
            );
            return Err(e.into());
        }

        info!(
            to = %envelope.to,
            subject = %envelope.subject,
            threaded = envelope.in_reply_to.is_some(),
            "Reply dispatched"
        );
        Ok(envelope)
    }

    fn check_sender(&self, email: &InboundEmail) -> Result<(), PipelineError> {
        match &self.config.allowed_senders {
            Some(allowed) if !allowed.permits(email.sender()) => {
                Err(PipelineError::SenderRejected(email.sender().to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn generate(&self, parts: Vec<ContentPart>) -> Result<String, PipelineError> {
        let request = build_request(&self.config, parts);
        let response = self.llm.complete(request).await?;

        debug!(
            model = self.llm.model_name(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        match response.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(PipelineError::Generation(
                "completion returned empty text".into(),
            )),
            None => Err(PipelineError::Generation(
                "completion returned no text content".into(),
            )),
        }
    }
}

/// System instruction plus one user turn holding the ordered parts.
fn build_request(config: &PipelineConfig, parts: Vec<ContentPart>) -> CompletionRequest {
    CompletionRequest::new(SYSTEM_PROMPT, parts).with_max_tokens(config.max_tokens)
}
