//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, verifies it
//! against the configured Cognito user pool and injects the verified
//! `Claims` into request extensions.

use crate::errors::{ApiError, INVALID_TOKEN_MESSAGE};
use auth_core::{IssuerConfig, TokenVerifier};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Verifier backed by the process-wide key store.
    pub verifier: Arc<TokenVerifier>,

    /// Pool tokens must come from.
    pub issuer: IssuerConfig,
}

/// Extract Bearer token from the Authorization header.
fn extract_bearer_token(req: &Request) -> Result<&str, ApiError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "nb.middleware.auth", "Missing Authorization header");
            ApiError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "nb.middleware.auth", "Invalid Authorization header format");
            ApiError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
        })
}

/// Authentication middleware.
///
/// A token signed by a key rotated in since the last JWKS fetch is accepted
/// after one forced key set refresh.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing or invalid
/// - 503 Service Unavailable if the JWKS could not be fetched
/// - 500 Internal Server Error if the pool configuration is invalid
/// - Otherwise continues with `Claims` in extensions
#[instrument(skip_all, name = "nb.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_bearer_token(&req)?;

    let claims = state
        .verifier
        .verify_with_rotation_retry(token, &state.issuer)
        .await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
