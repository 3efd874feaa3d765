//! Health check handlers.
//!
//! - `/health`: Liveness check - returns OK if the process is running
//! - `/ready`: Readiness check - checks the user pool JWKS can be loaded

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness check handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// Returns 200 when the pool's key set is cached or can be fetched, 503
/// otherwise. Uses the shared key store, so a successful check also warms the
/// cache used by request verification.
#[tracing::instrument(skip_all, name = "nb.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let issuer = &state.config.issuer;
    let jwks_check = state
        .verifier
        .key_store()
        .get_key_set(issuer.region(), issuer.user_pool_id())
        .await;

    match jwks_check {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                jwks: Some("available"),
                error: None,
            }),
        ),
        Err(e) => {
            // Log actual error server-side for operators
            tracing::warn!(target: "nb.health", error = %e, "Readiness check failed: JWKS unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    jwks: Some("unavailable"),
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}
