//! Current user handler.
//!
//! Returns the identity carried by the verified token.

use auth_core::Claims;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// User pool user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Username (`cognito:username` or `username`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// "id" or "access".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    /// Cognito group memberships.
    pub groups: Vec<String>,

    /// Token expiration timestamp.
    pub exp: i64,
}

impl From<&Claims> for MeResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            sub: claims.sub.clone(),
            username: claims.display_username().map(ToString::to_string),
            email: claims.email.clone(),
            token_use: claims.token_use.clone(),
            groups: claims.groups().into_iter().map(ToString::to_string).collect(),
            exp: claims.exp,
        }
    }
}

/// Handler for GET /api/me
///
/// Requires valid authentication via the auth middleware.
#[instrument(skip_all, name = "nb.handlers.me")]
pub async fn get_me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    tracing::debug!(target: "nb.handlers.me", "Returning user claims");
    Json(MeResponse::from(&claims))
}
