//! HTTP routes for the NebulaBridge API.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use auth_core::{KeyStore, TokenVerifier};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token verifier backed by the process-wide JWKS cache.
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Create state with a fresh key store built from `config`.
    pub fn new(config: Config) -> Self {
        let key_store = Arc::new(KeyStore::new(config.key_store_config()));
        Self {
            verifier: Arc::new(TokenVerifier::new(key_store)),
            config,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check (simple "OK") - public
/// - `/ready` - Readiness check (checks the pool JWKS) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api` - Greeting (GET) and message echo (POST) - requires authentication
/// - `/api/me` - Current user endpoint - requires authentication
/// - CORS for the configured origin; preflight requests need no token
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: Arc::clone(&state.verifier),
        issuer: state.config.issuer.clone(),
    });
    let cors = cors_layer(&state.config.cors_allowed_origin);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/api",
            get(handlers::get_message).post(handlers::post_message),
        )
        .route("/api/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. CorsLayer - Answer preflights before auth runs
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// CORS policy allowing `GET`, `POST` and `OPTIONS` with `Content-Type`
/// and `Authorization` headers from `origin` ("*" for any).
fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = if origin == "*" {
        AllowOrigin::from(Any)
    } else {
        match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(e) => {
                // Config validation rejects these; deny cross-origin requests if one slips through
                tracing::error!(target: "nb.routes", error = %e, "Invalid CORS origin, denying cross-origin requests");
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
