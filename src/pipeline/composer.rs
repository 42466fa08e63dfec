//! Reply composition.

use crate::pipeline::types::{InboundEmail, ReplyEnvelope};

const REPLY_PREFIX: &str = "Re: ";

/// Build the outbound reply for `email`.
///
/// The subject is always prefixed, even if it already starts with "Re: ".
/// Threading headers are set only when the original had a Message-Id.
pub fn compose(email: &InboundEmail, reply_text: &str) -> ReplyEnvelope {
    let message_id = email.message_id().map(str::to_string);
    ReplyEnvelope {
        to: email.sender().to_string(),
        subject: format!("{REPLY_PREFIX}{}", email.subject()),
        body: reply_text.to_string(),
        in_reply_to: message_id.clone(),
        references: message_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(subject: &str, message_id: Option<&str>) -> InboundEmail {
        InboundEmail::new("a@x.com", subject, "hello", message_id.map(String::from), vec![]).unwrap()
    }

    #[test]
    fn prefixes_subject() {
        let env = compose(&email("Hi", None), "Hello back");
        assert_eq!(env.to, "a@x.com");
        assert_eq!(env.subject, "Re: Hi");
        assert_eq!(env.body, "Hello back");
    }

    #[test]
    fn existing_prefix_not_deduplicated() {
        let env = compose(&email("Re: Hi", None), "x");
        assert_eq!(env.subject, "Re: Re: Hi");
    }

    #[test]
    fn empty_subject() {
        let env = compose(&email("", None), "x");
        assert_eq!(env.subject, "Re: ");
    }

    #[test]
    fn threading_headers_from_message_id() {
        let env = compose(&email("Hi", Some("<m1@x.com>")), "x");
        assert_eq!(env.in_reply_to.as_deref(), Some("<m1@x.com>"));
        assert_eq!(env.references.as_deref(), Some("<m1@x.com>"));
    }

    #[test]
    fn threading_headers_omitted_without_message_id() {
        let env = compose(&email("Hi", None), "x");
        assert!(env.in_reply_to.is_none());
        assert!(env.references.is_none());
    }

    #[test]
    fn body_kept_verbatim() {
        let text = "  Line one\n\nLine two  \n";
        let env = compose(&email("Hi", None), text);
        assert_eq!(env.body, text);
    }
}
