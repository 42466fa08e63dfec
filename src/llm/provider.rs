//! Provider-agnostic completion types and the `LlmProvider` trait.

use async_trait::async_trait;

use crate::error::LlmError;

/// One typed unit of a multi-modal user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text { value: String },
    /// Base64-encoded image bytes with their bare MIME type.
    Image { media_type: String, data: String },
}

impl ContentPart {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    pub fn image(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Image {
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// Request for a single completion: a system instruction and one user turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub parts: Vec<ContentPart>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            parts,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Completion result.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Text of the first choice. `None` when the provider returned no text
    /// content at all (for example only tool calls).
    pub text: Option<String>,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            usage: TokenUsage::default(),
        }
    }
}

/// A completion provider. Implementations must be safe to share across
/// concurrently running pipelines.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
