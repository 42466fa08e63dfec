//! SMTP dispatcher via lettre.
//!
//! Used instead of the Mailgun API when an SMTP relay is configured.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::info;

use crate::channels::dispatch::MailDispatcher;
use crate::config::SmtpConfig;
use crate::error::DispatchError;
use crate::pipeline::types::ReplyEnvelope;

const PROVIDER: &str = "smtp";

/// SMTP relay dispatcher. The transport is blocking, so sends run on the
/// blocking pool.
pub struct SmtpDispatcher {
    transport: SmtpTransport,
    from_address: String,
}

impl SmtpDispatcher {
    pub fn new(config: &SmtpConfig, from_address: impl Into<String>) -> Result<Self, DispatchError> {
        let mut builder = SmtpTransport::relay(&config.host)
            .map_err(|e| DispatchError::SendFailed {
                provider: PROVIDER.into(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(config.port)
            .timeout(Some(config.timeout));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: from_address.into(),
        })
    }
}

/// Build the RFC 5322 message for a reply.
pub fn build_message(from: &str, envelope: &ReplyEnvelope) -> Result<Message, DispatchError> {
    let mut builder = Message::builder()
        .from(from.parse().map_err(|e| DispatchError::InvalidAddress {
            address: from.to_string(),
            reason: format!("{e}"),
        })?)
        .to(envelope
            .to
            .parse()
            .map_err(|e| DispatchError::InvalidAddress {
                address: envelope.to.clone(),
                reason: format!("{e}"),
            })?)
        .subject(envelope.subject.as_str());

    if let Some(id) = &envelope.in_reply_to {
        builder = builder.in_reply_to(id.clone());
    }
    if let Some(refs) = &envelope.references {
        builder = builder.references(refs.clone());
    }

    builder
        .body(envelope.body.clone())
        .map_err(|e| DispatchError::SendFailed {
            provider: PROVIDER.into(),
            reason: format!("Failed to build email: {e}"),
        })
}

#[async_trait]
impl MailDispatcher for SmtpDispatcher {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn send(&self, envelope: &ReplyEnvelope) -> Result<(), DispatchError> {
        let email = build_message(&self.from_address, envelope)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| DispatchError::SendFailed {
                provider: PROVIDER.into(),
                reason: format!("SMTP task panicked: {e}"),
            })?
            .map_err(|e| DispatchError::SendFailed {
                provider: PROVIDER.into(),
                reason: format!("SMTP send failed: {e}"),
            })?;

        info!(to = %envelope.to, subject = %envelope.subject, "Reply sent via SMTP");
        Ok(())
    }
}
