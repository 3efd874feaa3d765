//! Request and response bodies.

use serde::Serialize;
use serde_json::{Map, Value};

/// Body of `POST /api`: any JSON object, of which only `text` is read.
#[derive(Debug, Clone, Default)]
pub struct MessageRequest {
    /// The `text` field, of any JSON type.
    pub text: Option<Value>,
}

impl MessageRequest {
    /// Parse a request body. Anything but a JSON object is an error.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        let mut fields: Map<String, Value> = serde_json::from_slice(body)?;
        Ok(Self {
            text: fields.remove("text"),
        })
    }

    /// `text` as echoed back: strings verbatim, missing or null as the
    /// empty string, any other value as its JSON text.
    pub fn echo_text(&self) -> String {
        match &self.text {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Body of every `/api` response.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Readiness check response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// JWKS availability: "available" or "unavailable".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<&'static str>,

    /// Generic error, only when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
