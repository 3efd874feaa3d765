//! Message handlers.
//!
//! `GET /api` returns a greeting; `POST /api` echoes the `text` field of a
//! JSON body. Both sit behind the auth middleware.

use crate::errors::ApiError;
use crate::models::{MessageRequest, MessageResponse};
use axum::body::Bytes;
use axum::Json;
use tracing::instrument;

/// Greeting returned for `GET /api` and for `POST /api` without a body.
pub const GREETING: &str =
    "Hello from NebulaBridge Lambda function! Send a POST request with text to process it.";

/// Handler for GET /api
#[instrument(skip_all, name = "nb.handlers.get_message")]
pub async fn get_message() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: GREETING.to_string(),
    })
}

/// Handler for POST /api
///
/// The body is parsed as a JSON object regardless of `Content-Type`; a
/// non-string `text` is echoed as its JSON text. An empty body gets the
/// greeting.
///
/// ## Response
///
/// ```json
/// { "message": "NebulaBridge received your message: hello" }
/// ```
#[instrument(skip_all, name = "nb.handlers.post_message")]
pub async fn post_message(body: Bytes) -> Result<Json<MessageResponse>, ApiError> {
    if body.is_empty() {
        return Ok(get_message().await);
    }

    let request = MessageRequest::from_json(&body).map_err(|e| {
        tracing::debug!(target: "nb.handlers.message", error = %e, "Invalid message body");
        ApiError::BadRequest("Error processing request: invalid JSON body".to_string())
    })?;

    let text = request.echo_text();
    tracing::debug!(target: "nb.handlers.message", text_len = text.len(), "Message received");

    Ok(Json(MessageResponse {
        message: format!("NebulaBridge received your message: {text}"),
    }))
}
