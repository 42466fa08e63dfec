//! Shared types for the reply pipeline.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ── Webhook payload ─────────────────────────────────────────────────

/// Raw form fields posted by the inbound-mail webhook.
///
/// Everything is optional here; [`InboundEmail::from_payload`] decides
/// what is actually required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, rename = "stripped-text")]
    pub stripped_text: Option<String>,
    #[serde(default, rename = "Message-Id")]
    pub message_id: Option<String>,
    /// JSON-encoded array of attachment descriptors.
    #[serde(default)]
    pub attachments: Option<String>,
}

// ── Attachments ─────────────────────────────────────────────────────

/// Reference to an attachment hosted by the webhook provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Only image attachments are downloaded, so only they need one.
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "content-type")]
    pub content_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

impl AttachmentRef {
    pub fn new(
        url: impl Into<String>,
        content_type: impl Into<String>,
        name: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            url: url.into(),
            content_type: content_type.into(),
            name: name.into(),
            size,
        }
    }

    /// Bare MIME type: parameters dropped, trimmed and lowercased.
    pub fn mime_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// Whether this attachment should be forwarded as an image part.
    ///
    /// Missing or malformed types are never images.
    pub fn is_image(&self) -> bool {
        self.mime_type()
            .strip_prefix("image/")
            .is_some_and(|subtype| !subtype.is_empty() && !subtype.contains(char::is_whitespace))
    }
}

/// Parse the JSON-encoded `attachments` form field.
///
/// Absent or blank means no attachments. Anything else must be a JSON
/// array of descriptors.
pub fn parse_attachments(raw: Option<&str>) -> Result<Vec<AttachmentRef>, PipelineError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Vec::new());
    };
    serde_json::from_str(raw)
        .map_err(|e| PipelineError::Validation(format!("malformed attachments field: {e}")))
}

// ── Inbound email ───────────────────────────────────────────────────

/// A validated inbound email. Construction guarantees a sender and at
/// least one of non-empty text or attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEmail {
    sender: String,
    subject: String,
    stripped_text: String,
    message_id: Option<String>,
    attachments: Vec<AttachmentRef>,
}

impl InboundEmail {
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        stripped_text: impl Into<String>,
        message_id: Option<String>,
        attachments: Vec<AttachmentRef>,
    ) -> Result<Self, PipelineError> {
        let sender = sender.into().trim().to_string();
        if sender.is_empty() {
            return Err(PipelineError::Validation("missing sender".into()));
        }

        let email = Self {
            sender,
            subject: subject.into(),
            stripped_text: stripped_text.into(),
            message_id: message_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            attachments,
        };

        if !email.has_text() && email.attachments.is_empty() {
            return Err(PipelineError::Validation(
                "email has neither text nor attachments".into(),
            ));
        }

        if let Some(attachment) = email
            .attachments
            .iter()
            .find(|a| a.is_image() && a.url.trim().is_empty())
        {
            return Err(PipelineError::Validation(format!(
                "image attachment {:?} has no url",
                attachment.name
            )));
        }

        Ok(email)
    }

    /// Parse and validate a raw webhook payload.
    pub fn from_payload(payload: WebhookPayload) -> Result<Self, PipelineError> {
        let attachments = parse_attachments(payload.attachments.as_deref())?;
        Self::new(
            payload.sender.unwrap_or_default(),
            payload.subject.unwrap_or_default(),
            payload.stripped_text.unwrap_or_default(),
            payload.message_id,
            attachments,
        )
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn stripped_text(&self) -> &str {
        &self.stripped_text
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn attachments(&self) -> &[AttachmentRef] {
        &self.attachments
    }

    /// Whitespace-only text counts as no text.
    pub fn has_text(&self) -> bool {
        !self.stripped_text.trim().is_empty()
    }
}

// ── Reply envelope ──────────────────────────────────────────────────

/// Outbound reply, fully derived from one inbound email and one generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyEnvelope {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

// ── Stages ──────────────────────────────────────────────────────────

/// Ordered stages of a pipeline run. A run only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Validating,
    Normalizing,
    Generating,
    Composing,
    Dispatching,
}

impl PipelineStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Normalizing => "normalizing",
            Self::Generating => "generating",
            Self::Composing => "composing",
            Self::Dispatching => "dispatching",
        }
    }
}
