//! Authentication integration tests.
//!
//! Tests bearer token validation on the protected endpoints using a mocked
//! Cognito JWKS provider.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use bridge_test_utils::{
    hs256_token, replace_payload, unsigned_token, TestBridgeServer, TestJwksServer, TestRsaKey,
    TestTokenBuilder, TEST_CLIENT_ID, TEST_KID,
};
use std::collections::HashMap;

async fn get_api(server: &TestBridgeServer, token: &str) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .get(format!("{}/api", server.url()))
        .bearer_auth(token)
        .send()
        .await?)
}

/// Assert the uniform 401 shape: generic message, no hint of the cause.
async fn assert_rejected(response: reqwest::Response) -> Result<()> {
    assert_eq!(response.status(), 401);

    let www_auth = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    assert!(
        www_auth.as_deref().is_some_and(|v| v.contains("invalid_token")),
        "Expected WWW-Authenticate with invalid_token, got {www_auth:?}"
    );

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    assert_eq!(
        body["error"]["message"],
        "The access token is invalid or expired"
    );

    Ok(())
}

#[tokio::test]
async fn test_valid_token_returns_greeting() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let token = TestTokenBuilder::new().sign_with(server.signing_key());

    let response = get_api(&server, &token).await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(
        body["message"],
        "Hello from NebulaBridge Lambda function! Send a POST request with text to process it."
    );

    Ok(())
}

#[tokio::test]
async fn test_missing_authorization_header() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api", server.url()))
        .send()
        .await?;

    assert_rejected(response).await?;
    assert_eq!(server.jwks().fetch_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_malformed_authorization_header() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let client = reqwest::Client::new();

    for header in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer   ", "token-without-scheme"] {
        let response = client
            .get(format!("{}/api", server.url()))
            .header("Authorization", header)
            .send()
            .await?;

        assert_rejected(response).await?;
    }

    Ok(())
}

#[tokio::test]
async fn test_expired_token_rejected() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .expires_in(-60)
        .sign_with(server.signing_key());

    assert_rejected(get_api(&server, &token).await?).await
}

#[tokio::test]
async fn test_wrong_audience_rejected() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .with_audience("some-other-client")
        .sign_with(server.signing_key());

    assert_rejected(get_api(&server, &token).await?).await
}

#[tokio::test]
async fn test_access_token_accepted() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .access_token(TEST_CLIENT_ID)
        .sign_with(server.signing_key());

    let response = get_api(&server, &token).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_token_signed_by_unpublished_key_rejected() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    // Right kid, wrong private key
    let impostor = TestRsaKey::key_b(TEST_KID);
    let token = TestTokenBuilder::new().sign_with(&impostor);

    assert_rejected(get_api(&server, &token).await?).await
}

#[tokio::test]
async fn test_tampered_payload_rejected() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .for_user("alice")
        .sign_with(server.signing_key());
    let elevated = TestTokenBuilder::new()
        .for_user("alice")
        .with_claim("cognito:groups", serde_json::json!(["admins"]))
        .build();

    let tampered = replace_payload(&token, &elevated);

    assert_rejected(get_api(&server, &tampered).await?).await
}

#[tokio::test]
async fn test_non_rs256_tokens_rejected() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let claims = TestTokenBuilder::new().build();

    for token in [
        hs256_token(TEST_KID, &claims, b"shared-secret"),
        unsigned_token(TEST_KID, &claims),
    ] {
        assert_rejected(get_api(&server, &token).await?).await?;
    }

    Ok(())
}

#[tokio::test]
async fn test_garbage_and_oversized_tokens_rejected() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let oversized = "a".repeat(9000);

    for token in ["not-a-jwt", "a.b.c", oversized.as_str()] {
        assert_rejected(get_api(&server, token).await?).await?;
    }
    // Rejected before any key lookup
    assert_eq!(server.jwks().fetch_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_rejected() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let token = TestTokenBuilder::new().sign_with(&server.signing_key().with_kid("retired-key"));

    assert_rejected(get_api(&server, &token).await?).await
}

#[tokio::test]
async fn test_key_rotation_picked_up_without_restart() -> Result<()> {
    let jwks = TestJwksServer::start().await;
    let old_key = TestRsaKey::key_a(TEST_KID);
    let new_key = TestRsaKey::key_b("test-key-B");
    jwks.serve_keys_once(&[&old_key]).await;
    jwks.serve_keys(&[&old_key, &new_key]).await;
    let server = TestBridgeServer::spawn_with(jwks, old_key.clone(), HashMap::new()).await?;

    let old_token = TestTokenBuilder::new().sign_with(&old_key);
    assert_eq!(get_api(&server, &old_token).await?.status(), 200);

    // Cached set predates key B; the unknown kid forces one refetch
    let new_token = TestTokenBuilder::new().sign_with(&new_key);
    assert_eq!(get_api(&server, &new_token).await?.status(), 200);
    assert_eq!(server.jwks().fetch_count().await, 2);

    // Now cached
    assert_eq!(get_api(&server, &new_token).await?.status(), 200);
    assert_eq!(server.jwks().fetch_count().await, 2);

    Ok(())
}

#[tokio::test]
async fn test_provider_outage_returns_503() -> Result<()> {
    let jwks = TestJwksServer::start().await;
    jwks.serve_status(500).await;
    let key = TestRsaKey::key_a(TEST_KID);
    let server = TestBridgeServer::spawn_with(jwks, key, HashMap::new()).await?;
    let token = TestTokenBuilder::new().sign_with(server.signing_key());

    let response = get_api(&server, &token).await?;

    assert_eq!(response.status(), 503);
    assert!(response.headers().get("www-authenticate").is_none());
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    Ok(())
}

#[tokio::test]
async fn test_me_returns_identity_from_token() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .for_user("alice")
        .with_email("alice@example.com")
        .with_claim("cognito:groups", serde_json::json!(["admins", "staff"]))
        .sign_with(server.signing_key());

    let response = reqwest::Client::new()
        .get(format!("{}/api/me", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["token_use"], "id");
    assert_eq!(body["groups"], serde_json::json!(["admins", "staff"]));
    assert!(body["exp"].is_i64());

    Ok(())
}

#[tokio::test]
async fn test_me_requires_auth() -> Result<()> {
    let server = TestBridgeServer::spawn().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/me", server.url()))
        .send()
        .await?;

    assert_rejected(response).await
}
