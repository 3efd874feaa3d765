//! Key store and verification metrics.
//!
//! All metrics use the `nb_` prefix. Label values come from fixed sets
//! (`status`, `result`, `AuthError::reason_code`) so cardinality is bounded.
//! Nothing is recorded unless the embedding process installs a recorder.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record a JWKS fetch attempt.
///
/// Metric: `nb_jwks_fetch_total`, `nb_jwks_fetch_duration_seconds`
/// Labels: `status` ("success", "error")
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("nb_jwks_fetch_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("nb_jwks_fetch_total", "status" => status).increment(1);
}

/// Record a key set cache lookup.
///
/// Metric: `nb_jwks_cache_total`
/// Labels: `result` ("hit", "miss", "forced")
pub fn record_jwks_cache(result: &'static str) {
    counter!("nb_jwks_cache_total", "result" => result).increment(1);
}

/// Record the outcome of one verification.
///
/// Metric: `nb_token_verifications_total`
/// Labels: `result` ("valid" or an `AuthError::reason_code`)
pub fn record_verification(result: &'static str) {
    counter!("nb_token_verifications_total", "result" => result).increment(1);
}
