//! Inbound email → reply pipeline.
//!
//! Every webhook call flows through:
//! 1. `InboundEmail::from_payload()`: parse and validate
//! 2. `ContentNormalizer::normalize()`: text + image parts, in order
//! 3. `LlmProvider::complete()`: one completion round trip
//! 4. `compose()`: reply envelope with threading headers
//! 5. `MailDispatcher::send()`: hand off for delivery
//!
//! `EmailReplyPipeline` runs these in order and stops at the first failure.

pub mod composer;
pub mod normalizer;
pub mod processor;
pub mod senders;
pub mod types;

pub use composer::compose;
pub use normalizer::ContentNormalizer;
pub use processor::EmailReplyPipeline;
pub use types::{AttachmentRef, InboundEmail, PipelineStage, ReplyEnvelope, WebhookPayload};
