//! Mock Cognito JWKS endpoint
//!
//! Wraps a wiremock `MockServer` answering on
//! `/<user_pool_id>/.well-known/jwks.json`, the path layout a key store uses
//! when pointed at a provider base URL.

use crate::crypto_fixtures::{jwks_json, TestRsaKey};
use crate::token_builders::TEST_USER_POOL_ID;
use auth_core::KeyStoreConfig;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock JWKS provider for one user pool.
///
/// Mocks mounted earlier take precedence; `*_once` mocks step aside after
/// one response so a later mount can model rotation or an outage.
pub struct TestJwksServer {
    server: MockServer,
    user_pool_id: String,
}

impl TestJwksServer {
    /// Start a provider for [`TEST_USER_POOL_ID`].
    pub async fn start() -> Self {
        Self::start_for_pool(TEST_USER_POOL_ID).await
    }

    pub async fn start_for_pool(user_pool_id: &str) -> Self {
        Self {
            server: MockServer::start().await,
            user_pool_id: user_pool_id.to_string(),
        }
    }

    /// Provider base URL (for `KeyStoreConfig::provider_base_url`).
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Path of the pool's JWKS document.
    pub fn jwks_path(&self) -> String {
        format!("/{}/.well-known/jwks.json", self.user_pool_id)
    }

    /// Key store settings pointed at this provider.
    ///
    /// `min_refresh_interval` is zero so forced refreshes always refetch.
    pub fn key_store_config(&self, ttl: Duration) -> KeyStoreConfig {
        KeyStoreConfig {
            ttl,
            fetch_timeout: Duration::from_secs(2),
            min_refresh_interval: Duration::ZERO,
            provider_base_url: Some(self.uri()),
        }
    }

    fn jwks_mock(&self) -> wiremock::MockBuilder {
        Mock::given(method("GET")).and(path(self.jwks_path()))
    }

    /// Serve `keys` for every request.
    pub async fn serve_keys(&self, keys: &[&TestRsaKey]) {
        self.jwks_mock()
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` and fail the test on drop unless exactly `fetches`
    /// requests arrived.
    pub async fn serve_keys_expecting(&self, keys: &[&TestRsaKey], fetches: u64) {
        self.jwks_mock()
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .expect(fetches)
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` for the next request only.
    pub async fn serve_keys_once(&self, keys: &[&TestRsaKey]) {
        self.jwks_mock()
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Serve `keys` after `delay`.
    pub async fn serve_keys_delayed(&self, keys: &[&TestRsaKey], delay: Duration) {
        self.jwks_mock()
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_json(keys))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer every request with an empty body and `status`.
    pub async fn serve_status(&self, status: u16) {
        self.jwks_mock()
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answer every request with 200 and a raw body.
    pub async fn serve_raw(&self, body: &str) {
        self.jwks_mock()
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Number of requests received so far.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Drop all mounted mocks and recorded requests.
    pub async fn reset(&self) {
        self.server.reset().await;
    }
}
