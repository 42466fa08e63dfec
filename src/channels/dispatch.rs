//! Outbound mail abstraction shared by the Mailgun and SMTP dispatchers.

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::pipeline::types::ReplyEnvelope;

/// Hands a composed reply to an outbound-mail provider.
///
/// Implementations own the process-wide "from" address and are safe to
/// share across concurrent pipeline runs.
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, envelope: &ReplyEnvelope) -> Result<(), DispatchError>;
}

/// Provider-neutral field list for a reply, in send order.
///
/// Threading headers appear only when the envelope carries them.
pub fn envelope_fields<'a>(from: &'a str, envelope: &'a ReplyEnvelope) -> Vec<(&'static str, &'a str)> {
    let mut fields = vec![
        ("from", from),
        ("to", envelope.to.as_str()),
        ("subject", envelope.subject.as_str()),
        ("text", envelope.body.as_str()),
    ];
    if let Some(id) = envelope.in_reply_to.as_deref() {
        fields.push(("h:In-Reply-To", id));
    }
    if let Some(refs) = envelope.references.as_deref() {
        fields.push(("h:References", refs));
    }
    fields
}
