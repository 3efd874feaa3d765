//! Builder patterns for test token construction
//!
//! Provides a fluent API for Cognito-shaped claims plus helpers for the
//! forged tokens an attacker might present.

use crate::crypto_fixtures::TestRsaKey;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Region used by test pools.
pub const TEST_REGION: &str = "us-east-1";

/// User pool id used by test pools.
pub const TEST_USER_POOL_ID: &str = "us-east-1_TestPool";

/// App client id tokens are issued for by default.
pub const TEST_CLIENT_ID: &str = "client1";

/// Issuer URL matching [`TEST_REGION`] and [`TEST_USER_POOL_ID`].
pub fn test_issuer() -> String {
    format!("https://cognito-idp.{TEST_REGION}.amazonaws.com/{TEST_USER_POOL_ID}")
}

/// Builder for Cognito ID/access token claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_audience("client1")
///     .expires_in(3600)
///     .build();
/// let token = key.sign(&claims);
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// ID token for `test-user`, audience [`TEST_CLIENT_ID`], issued by the
    /// test pool, valid for an hour.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("cognito:username".to_string(), json!("test-user"));
        claims.insert("aud".to_string(), json!(TEST_CLIENT_ID));
        claims.insert("iss".to_string(), json!(test_issuer()));
        claims.insert("token_use".to_string(), json!("id"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    /// Set subject and username.
    pub fn for_user(mut self, username: &str) -> Self {
        self.claims
            .insert("sub".to_string(), json!(format!("{username}-sub")));
        self.claims
            .insert("cognito:username".to_string(), json!(username));
        self
    }

    pub fn with_email(self, email: &str) -> Self {
        self.with_claim("email", json!(email))
    }

    /// Set a single `aud` value.
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set `aud` as an array.
    pub fn with_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    /// Reshape into an access token: no `aud`, `client_id` instead.
    pub fn access_token(mut self, client_id: &str) -> Self {
        let username = self.claims.remove("cognito:username");
        self.claims.remove("aud");
        self.claims.insert("token_use".to_string(), json!("access"));
        self.claims.insert("client_id".to_string(), json!(client_id));
        if let Some(username) = username {
            self.claims.insert("username".to_string(), username);
        }
        self
    }

    /// Set expiration in seconds from now (negative for already expired).
    pub fn expires_in(self, seconds: i64) -> Self {
        self.expires_at((Utc::now() + Duration::seconds(seconds)).timestamp())
    }

    pub fn expires_at(self, timestamp: i64) -> Self {
        self.with_claim("exp", json!(timestamp))
    }

    /// Set the issuer to another pool.
    pub fn issued_by_pool(self, region: &str, user_pool_id: &str) -> Self {
        self.with_claim(
            "iss",
            json!(format!(
                "https://cognito-idp.{region}.amazonaws.com/{user_pool_id}"
            )),
        )
    }

    /// Set any claim.
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim.
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Build and sign with RS256.
    pub fn sign_with(self, key: &TestRsaKey) -> String {
        key.sign(&self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_json(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string())
}

/// Token with `alg: none` and an empty signature segment.
pub fn unsigned_token(kid: &str, claims: &Value) -> String {
    format!(
        "{}.{}.",
        encode_json(&json!({"alg": "none", "typ": "JWT", "kid": kid})),
        encode_json(claims)
    )
}

/// Token MACed with HS256 using `secret` (algorithm confusion attempt).
pub fn hs256_token(kid: &str, claims: &Value, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret))
        .expect("HS256 signing should succeed")
}

/// Swap a signed token's payload, keeping its header and signature.
pub fn replace_payload(token: &str, claims: &Value) -> String {
    let mut segments = token.split('.');
    let header = segments.next().expect("token should have a header");
    let _payload = segments.next();
    let signature = segments.next().expect("token should have a signature");
    format!("{header}.{}.{signature}", encode_json(claims))
}
