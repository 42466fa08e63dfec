//! HTTP surface: the inbound-mail webhook and a health check.

use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::pipeline::processor::EmailReplyPipeline;
use crate::pipeline::types::WebhookPayload;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EmailReplyPipeline>,
}

/// Build the router with `POST /webhook` and `GET /health`.
pub fn webhook_routes(pipeline: Arc<EmailReplyPipeline>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pipeline })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Runs the pipeline for one webhook call. This is the only place pipeline
/// failures are logged and turned into a response.
async fn handle_webhook(State(state): State<AppState>, request: Request) -> Response {
    let result = match read_payload(request).await {
        Ok(payload) => state.pipeline.process(payload).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(envelope) => {
            info!(to = %envelope.to, subject = %envelope.subject, "Webhook handled");
            Json(serde_json::json!({
                "status": "sent",
                "to": envelope.to,
                "subject": envelope.subject,
            }))
            .into_response()
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Failed to process inbound email");
            error_response(&e)
        }
    }
}

/// Decode the webhook body. Mail relays post either
/// `application/x-www-form-urlencoded` or `multipart/form-data`.
async fn read_payload(request: Request) -> Result<WebhookPayload, PipelineError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(payload) = Form::<WebhookPayload>::from_request(request, &())
            .await
            .map_err(malformed)?;
        return Ok(payload);
    }

    let mut multipart = Multipart::from_request(request, &()).await.map_err(malformed)?;
    let mut fields = serde_json::Map::new();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        // Attachments are fetched by url, uploaded files are ignored.
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field.text().await.map_err(malformed)?;
        fields.insert(name, Value::String(value));
    }
    serde_json::from_value(Value::Object(fields)).map_err(malformed)
}

fn malformed(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Validation(format!("malformed webhook body: {err}"))
}

fn error_response(err: &PipelineError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    };
    (
        status,
        Json(serde_json::json!({
            "error": err.to_string(),
            "kind": err.kind(),
        })),
    )
        .into_response()
}
