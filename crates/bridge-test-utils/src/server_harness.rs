//! Test server harness for E2E testing
//!
//! Provides `TestBridgeServer` for spawning real API instances wired to a
//! mock JWKS provider.

use crate::crypto_fixtures::TestRsaKey;
use crate::jwks_server::TestJwksServer;
use crate::token_builders::{TEST_CLIENT_ID, TEST_REGION, TEST_USER_POOL_ID};
use bridge_api::config::Config;
use bridge_api::observability::metrics::init_metrics_recorder;
use bridge_api::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Prometheus handle shared by every server in the test binary.
///
/// The first caller installs the global recorder; if another test already
/// installed one, a detached handle is used instead.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Kid under which the harness publishes fixture key A.
pub const TEST_KID: &str = "test-key-A";

/// Test harness for spawning the API in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_greeting() -> Result<(), anyhow::Error> {
///     let server = TestBridgeServer::spawn().await?;
///     let token = TestTokenBuilder::new().sign_with(server.signing_key());
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/api", server.url()))
///         .bearer_auth(token)
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestBridgeServer {
    addr: SocketAddr,
    config: Config,
    jwks: TestJwksServer,
    signing_key: TestRsaKey,
    _handle: JoinHandle<()>,
}

impl TestBridgeServer {
    /// Spawn a server whose JWKS provider publishes fixture key A as
    /// [`TEST_KID`], expecting audience [`TEST_CLIENT_ID`].
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let jwks = TestJwksServer::start().await;
        let signing_key = TestRsaKey::key_a(TEST_KID);
        jwks.serve_keys(&[&signing_key]).await;

        Self::spawn_with(jwks, signing_key, HashMap::new()).await
    }

    /// Spawn against a prepared provider.
    ///
    /// `overrides` are applied on top of the harness environment (pool,
    /// client id, provider URL, no forced-refresh rate limit), so tests can
    /// change any setting.
    pub async fn spawn_with(
        jwks: TestJwksServer,
        signing_key: TestRsaKey,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("COGNITO_REGION".to_string(), TEST_REGION.to_string()),
            (
                "COGNITO_USER_POOL_ID".to_string(),
                TEST_USER_POOL_ID.to_string(),
            ),
            ("COGNITO_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            // Rotation tests need forced refreshes to refetch immediately
            ("JWKS_MIN_REFRESH_SECONDS".to_string(), "0".to_string()),
            ("JWKS_PROVIDER_URL".to_string(), jwks.uri()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::new(config.clone()));
        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            jwks,
            signing_key,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock JWKS provider behind this server.
    pub fn jwks(&self) -> &TestJwksServer {
        &self.jwks
    }

    /// Key the provider publishes; tokens signed with it verify.
    pub fn signing_key(&self) -> &TestRsaKey {
        &self.signing_key
    }
}

impl Drop for TestBridgeServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
