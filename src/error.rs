//! Error types for the mail responder.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Completion provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },
}

/// Outbound mail errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to send via {provider}: {reason}")]
    SendFailed { provider: String, reason: String },

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("{provider} rejected the message with status {status}: {body}")]
    Rejected {
        provider: String,
        status: u16,
        body: String,
    },
}

/// Errors raised while processing a single inbound email.
///
/// Every variant short-circuits the run; nothing is dispatched after one
/// of these is produced.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid inbound email: {0}")]
    Validation(String),

    #[error("Sender not allowed: {0}")]
    SenderRejected(String),

    #[error("Failed to download attachment {url}: {reason}")]
    Download {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Reply generation failed: {0}")]
    Generation(String),

    #[error("Completion request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Reply dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl PipelineError {
    /// Stable label used in logs and webhook responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::SenderRejected(_) => "sender_rejected",
            Self::Download { .. } => "download",
            Self::Generation(_) | Self::Llm(_) => "generation",
            Self::Dispatch(_) => "dispatch",
        }
    }

    /// Whether the failure was caused by the inbound payload itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::SenderRejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(PipelineError::Validation("x".into()).kind(), "validation");
        assert_eq!(
            PipelineError::SenderRejected("x".into()).kind(),
            "sender_rejected"
        );
        assert_eq!(
            PipelineError::Download {
                url: "http://x".into(),
                status: Some(404),
                reason: "not found".into(),
            }
            .kind(),
            "download"
        );
        assert_eq!(PipelineError::Generation("x".into()).kind(), "generation");
        assert_eq!(
            PipelineError::Dispatch(DispatchError::SendFailed {
                provider: "mailgun".into(),
                reason: "boom".into(),
            })
            .kind(),
            "dispatch"
        );
    }

    #[test]
    fn llm_failures_report_as_generation() {
        let err = PipelineError::from(LlmError::RequestFailed {
            provider: "openai".into(),
            reason: "timed out after 30s".into(),
        });
        assert_eq!(err.kind(), "generation");
        assert!(!err.is_client_error());
    }

    #[test]
    fn client_errors() {
        assert!(PipelineError::Validation("empty".into()).is_client_error());
        assert!(PipelineError::SenderRejected("a@b.c".into()).is_client_error());
        assert!(!PipelineError::Generation("empty".into()).is_client_error());
    }

    #[test]
    fn download_error_message_includes_url() {
        let err = PipelineError::Download {
            url: "https://files.example.com/a.png".into(),
            status: Some(403),
            reason: "HTTP 403 Forbidden".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://files.example.com/a.png"));
        assert!(msg.contains("403"));
    }
}
