//! Verification integration tests.
//!
//! Runs the full verifier against a mocked Cognito JWKS endpoint, covering
//! caching, TTL refresh, key rotation and provider failures.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use auth_core::{AuthError, FailureKind, IssuerConfig, KeyStore, TokenVerifier, VerificationResult};
use bridge_test_utils::{
    TestJwksServer, TestRsaKey, TestTokenBuilder, TEST_CLIENT_ID, TEST_REGION, TEST_USER_POOL_ID,
};
use std::sync::Arc;
use std::time::Duration;

fn issuer() -> IssuerConfig {
    IssuerConfig::new(
        TEST_REGION,
        TEST_USER_POOL_ID,
        Some(TEST_CLIENT_ID.to_string()),
    )
    .unwrap()
}

fn verifier_for(jwks: &TestJwksServer, ttl: Duration) -> TokenVerifier {
    TokenVerifier::new(Arc::new(KeyStore::new(jwks.key_store_config(ttl))))
}

#[tokio::test]
async fn test_same_token_twice_fetches_once() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys_expecting(&[&key], 1).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let token = TestTokenBuilder::new().sign_with(&key);

    let first = verifier.verify(&token, &issuer()).await;
    let second = verifier.verify(&token, &issuer()).await;

    assert!(first.is_ok());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_claims_equal_decoded_payload() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys(&[&key]).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let payload = TestTokenBuilder::new()
        .for_user("alice")
        .with_email("alice@example.com")
        .with_claim("cognito:groups", serde_json::json!(["admins"]))
        .with_claim("custom:tenant", serde_json::json!("acme"))
        .build();
    let token = key.sign(&payload);

    let claims = verifier.verify(&token, &issuer()).await.unwrap();

    assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    assert_eq!(claims.username.as_deref(), Some("alice"));
    assert_eq!(claims.groups(), vec!["admins"]);
}

#[tokio::test]
async fn test_rotated_key_resolvable_after_ttl() {
    let jwks = TestJwksServer::start().await;
    let old_key = TestRsaKey::key_a("A");
    let new_key = TestRsaKey::key_b("B");
    jwks.serve_keys_once(&[&old_key]).await;
    jwks.serve_keys(&[&old_key, &new_key]).await;
    let verifier = verifier_for(&jwks, Duration::from_millis(200));
    let rotated_token = TestTokenBuilder::new().sign_with(&new_key);

    // Before rotation: B unknown, plain verify does not retry
    assert_eq!(
        verifier.verify(&rotated_token, &issuer()).await,
        Err(AuthError::KeyNotFound("B".to_string()))
    );
    assert_eq!(jwks.fetch_count().await, 1);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(verifier.verify(&rotated_token, &issuer()).await.is_ok());
    assert_eq!(jwks.fetch_count().await, 2);
}

#[tokio::test]
async fn test_rotation_retry_refreshes_once() {
    let jwks = TestJwksServer::start().await;
    let old_key = TestRsaKey::key_a("A");
    let new_key = TestRsaKey::key_b("B");
    jwks.serve_keys_once(&[&old_key]).await;
    jwks.serve_keys(&[&old_key, &new_key]).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));

    // Populate the cache with the pre-rotation key set
    let old_token = TestTokenBuilder::new().sign_with(&old_key);
    assert!(verifier.verify(&old_token, &issuer()).await.is_ok());

    let rotated_token = TestTokenBuilder::new().sign_with(&new_key);
    let result = verifier
        .verify_with_rotation_retry(&rotated_token, &issuer())
        .await;

    assert!(result.is_ok(), "Expected rotated key to verify, got {result:?}");
    assert_eq!(jwks.fetch_count().await, 2);
}

#[tokio::test]
async fn test_rotation_retry_second_miss_is_terminal() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys_expecting(&[&key], 2).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let token = TestTokenBuilder::new().sign_with(&key.with_kid("unknown"));

    let result = verifier.verify_with_rotation_retry(&token, &issuer()).await;

    assert_eq!(result, Err(AuthError::KeyNotFound("unknown".to_string())));
}

#[tokio::test]
async fn test_rotation_retry_rate_limited_by_min_refresh_interval() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys_expecting(&[&key], 1).await;
    let mut config = jwks.key_store_config(Duration::from_secs(3600));
    config.min_refresh_interval = Duration::from_secs(60);
    let verifier = TokenVerifier::new(Arc::new(KeyStore::new(config)));

    for kid in ["made-up-1", "made-up-2", "made-up-3"] {
        let token = TestTokenBuilder::new().sign_with(&key.with_kid(kid));
        let result = verifier.verify_with_rotation_retry(&token, &issuer()).await;
        assert!(matches!(result, Err(AuthError::KeyNotFound(_))));
    }
}

#[tokio::test]
async fn test_provider_error_is_distinct_from_bad_credential() {
    let jwks = TestJwksServer::start().await;
    jwks.serve_status(500).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let token = TestTokenBuilder::new().sign_with(&TestRsaKey::key_a("A"));

    let result = verifier
        .verify_token(&token, TEST_REGION, TEST_USER_POOL_ID, Some(TEST_CLIENT_ID))
        .await;

    let VerificationResult::Invalid(error) = result else {
        panic!("Expected Invalid, got {result:?}");
    };
    assert!(matches!(error, AuthError::KeyFetch(_)));
    assert_eq!(error.kind(), FailureKind::Unavailable);
    assert_ne!(AuthError::InvalidSignature.kind(), error.kind());
}

#[tokio::test]
async fn test_failed_refresh_does_not_serve_stale_keys() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys_once(&[&key]).await;
    jwks.serve_status(503).await;
    let verifier = verifier_for(&jwks, Duration::from_millis(100));
    let token = TestTokenBuilder::new().sign_with(&key);

    assert!(verifier.verify(&token, &issuer()).await.is_ok());
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(matches!(
        verifier.verify(&token, &issuer()).await,
        Err(AuthError::KeyFetch(_))
    ));
}

#[tokio::test]
async fn test_malformed_jwks_is_key_fetch() {
    let jwks = TestJwksServer::start().await;
    jwks.serve_raw(r#"{"keys": "not-a-list"}"#).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let token = TestTokenBuilder::new().sign_with(&TestRsaKey::key_a("A"));

    assert!(matches!(
        verifier.verify(&token, &issuer()).await,
        Err(AuthError::KeyFetch(_))
    ));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys_delayed(&[&key], Duration::from_millis(800))
        .await;
    let mut config = jwks.key_store_config(Duration::from_secs(3600));
    config.fetch_timeout = Duration::from_millis(100);
    let verifier = TokenVerifier::new(Arc::new(KeyStore::new(config)));
    let token = TestTokenBuilder::new().sign_with(&key);

    assert!(matches!(
        verifier.verify(&token, &issuer()).await,
        Err(AuthError::KeyFetch(_))
    ));
}

#[tokio::test]
async fn test_concurrent_verifications_share_one_fetch() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys_delayed(&[&key], Duration::from_millis(100))
        .await;
    let verifier = Arc::new(verifier_for(&jwks, Duration::from_secs(3600)));
    let token = TestTokenBuilder::new().sign_with(&key);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let verifier = Arc::clone(&verifier);
        let token = token.clone();
        tasks.spawn(async move { verifier.verify(&token, &issuer()).await });
    }

    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().is_ok());
    }
    assert_eq!(jwks.fetch_count().await, 1);
}

#[tokio::test]
async fn test_access_token_checked_against_client_id() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys(&[&key]).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));

    let own = TestTokenBuilder::new()
        .access_token(TEST_CLIENT_ID)
        .sign_with(&key);
    let foreign = TestTokenBuilder::new()
        .access_token("another-client")
        .sign_with(&key);

    assert!(verifier.verify(&own, &issuer()).await.is_ok());
    assert_eq!(
        verifier.verify(&foreign, &issuer()).await,
        Err(AuthError::AudienceMismatch)
    );
}

#[tokio::test]
async fn test_token_from_other_pool_is_issuer_mismatch() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys(&[&key]).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let token = TestTokenBuilder::new()
        .issued_by_pool(TEST_REGION, "us-east-1_Elsewhere")
        .sign_with(&key);

    assert_eq!(
        verifier.verify(&token, &issuer()).await,
        Err(AuthError::IssuerMismatch)
    );
}

#[tokio::test]
async fn test_audience_array_contains_client() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys(&[&key]).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let token = TestTokenBuilder::new()
        .with_audiences(&["other", TEST_CLIENT_ID])
        .sign_with(&key);

    assert!(verifier.verify(&token, &issuer()).await.is_ok());
}

#[tokio::test]
async fn test_no_audience_configured_skips_check() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys(&[&key]).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let token = TestTokenBuilder::new()
        .with_audience("whatever")
        .sign_with(&key);

    let result = verifier
        .verify_token(&token, TEST_REGION, TEST_USER_POOL_ID, None)
        .await;

    assert!(result.is_valid());
}

#[tokio::test]
async fn test_fractional_exp_accepted() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    jwks.serve_keys(&[&key]).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let exp = chrono::Utc::now().timestamp() + 3600;
    let token = TestTokenBuilder::new()
        .with_claim("exp", serde_json::json!(exp as f64 + 0.5))
        .sign_with(&key);

    let claims = verifier.verify(&token, &issuer()).await.unwrap();

    assert_eq!(claims.exp, exp);
}

#[tokio::test]
async fn test_key_without_kid_does_not_poison_key_set() {
    let jwks = TestJwksServer::start().await;
    let key = TestRsaKey::key_a("A");
    let mut anonymous = TestRsaKey::key_b("unused").jwk();
    anonymous.as_object_mut().unwrap().remove("kid");
    let document = serde_json::json!({ "keys": [anonymous, key.jwk()] });
    jwks.serve_raw(&document.to_string()).await;
    let verifier = verifier_for(&jwks, Duration::from_secs(3600));
    let token = TestTokenBuilder::new().sign_with(&key);

    assert!(verifier.verify(&token, &issuer()).await.is_ok());
}
