//! Mailgun HTTP API dispatcher.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::channels::dispatch::{MailDispatcher, envelope_fields};
use crate::config::MailgunConfig;
use crate::error::DispatchError;
use crate::pipeline::types::ReplyEnvelope;

const PROVIDER: &str = "mailgun";

/// Sends replies through `POST {base}/{domain}/messages`.
pub struct MailgunDispatcher {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    from_address: String,
}

impl MailgunDispatcher {
    pub fn new(config: &MailgunConfig, from_address: impl Into<String>) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DispatchError::SendFailed {
                provider: PROVIDER.into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/{}/messages",
                config.api_base.trim_end_matches('/'),
                config.domain
            ),
            from_address: from_address.into(),
        })
    }
}

#[async_trait]
impl MailDispatcher for MailgunDispatcher {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn send(&self, envelope: &ReplyEnvelope) -> Result<(), DispatchError> {
        let fields = envelope_fields(&self.from_address, envelope);

        let res = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(self.api_key.expose_secret()))
            .form(&fields)
            .send()
            .await
            .map_err(|e| DispatchError::SendFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }

        info!(to = %envelope.to, subject = %envelope.subject, "Reply sent via Mailgun");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use tokio::net::TcpListener;

    use super::*;

    type Seen = Arc<Mutex<Vec<(String, Option<String>, HashMap<String, String>)>>>;

    async fn serve(status: StatusCode) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/v3/{domain}/messages",
                post(
                    move |State(seen): State<Seen>,
                          Path(domain): Path<String>,
                          headers: HeaderMap,
                          Form(form): Form<HashMap<String, String>>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        seen.lock().unwrap().push((domain, auth, form));
                        (status, Json(serde_json::json!({"message": "Queued. Thank you."})))
                    },
                ),
            )
            .with_state(seen.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://127.0.0.1:{port}/v3"), seen)
    }

    fn dispatcher(base: &str) -> MailgunDispatcher {
        let config = MailgunConfig {
            api_key: SecretString::from("key-test"),
            domain: "mg.example.com".into(),
            api_base: base.to_string(),
            timeout: Duration::from_secs(5),
        };
        MailgunDispatcher::new(&config, "bot@mg.example.com").unwrap()
    }

    fn envelope(message_id: Option<&str>) -> ReplyEnvelope {
        ReplyEnvelope {
            to: "a@x.com".into(),
            subject: "Re: Hi".into(),
            body: "It's 4.".into(),
            in_reply_to: message_id.map(String::from),
            references: message_id.map(String::from),
        }
    }

    #[tokio::test]
    async fn posts_form_with_threading_headers() {
        let (base, seen) = serve(StatusCode::OK).await;
        dispatcher(&base)
            .send(&envelope(Some("<m1@x.com>")))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (domain, auth, form) = &seen[0];
        assert_eq!(domain, "mg.example.com");
        // base64("api:key-test")
        assert_eq!(auth.as_deref(), Some("Basic YXBpOmtleS10ZXN0"));
        assert_eq!(form["from"], "bot@mg.example.com");
        assert_eq!(form["to"], "a@x.com");
        assert_eq!(form["subject"], "Re: Hi");
        assert_eq!(form["text"], "It's 4.");
        assert_eq!(form["h:In-Reply-To"], "<m1@x.com>");
        assert_eq!(form["h:References"], "<m1@x.com>");
    }

    #[tokio::test]
    async fn omits_threading_headers_without_message_id() {
        let (base, seen) = serve(StatusCode::OK).await;
        dispatcher(&base).send(&envelope(None)).await.unwrap();

        let seen = seen.lock().unwrap();
        let form = &seen[0].2;
        assert!(!form.contains_key("h:In-Reply-To"));
        assert!(!form.contains_key("h:References"));
    }

    #[tokio::test]
    async fn provider_rejection_is_reported() {
        let (base, _) = serve(StatusCode::BAD_REQUEST).await;
        match dispatcher(&base).send(&envelope(None)).await {
            Err(DispatchError::Rejected { status, body, .. }) => {
                assert_eq!(status, 400);
                assert!(body.contains("Queued"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_built_from_base_and_domain() {
        let d = dispatcher("https://api.mailgun.net/v3/");
        assert_eq!(d.endpoint, "https://api.mailgun.net/v3/mg.example.com/messages");
        assert_eq!(d.name(), "mailgun");
    }
}
