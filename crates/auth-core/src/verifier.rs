//! RS256 token verification for Cognito user pools.
//!
//! Verification runs five steps and stops at the first failure:
//!
//! 1. Parse the compact token (size limit, three base64url segments)
//! 2. Decode the header (`alg`, `kid`)
//! 3. Resolve the signing key for `kid` from the [`KeyStore`]
//! 4. Check the algorithm and verify the RS256 signature
//! 5. Decode the payload and validate `exp`, `aud` and `iss`
//!
//! # Security
//!
//! - Only RS256 is accepted, for both the token header and the key; `none`
//!   and HMAC algorithms fail with `UnsupportedAlgorithm`
//! - A key is only used for tokens whose `kid` matches it exactly
//! - No claims are returned from a failed verification

use crate::claims::Claims;
use crate::config::IssuerConfig;
use crate::error::AuthError;
use crate::jwks::{KeyStore, SigningKey};
use crate::metrics::record_verification;
use crate::token::{parse_token, ParsedToken, SUPPORTED_ALGORITHM};
use jsonwebtoken::{Algorithm, DecodingKey};
use std::sync::Arc;
use tracing::instrument;

/// Outcome of one verification: valid claims or the reason for rejection.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    /// Every check passed.
    Valid(Claims),

    /// The first check that failed.
    Invalid(AuthError),
}

impl VerificationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid(_))
    }

    /// Verified claims, if valid.
    #[must_use]
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            VerificationResult::Valid(claims) => Some(claims),
            VerificationResult::Invalid(_) => None,
        }
    }

    /// Rejection reason, if invalid.
    #[must_use]
    pub fn error(&self) -> Option<&AuthError> {
        match self {
            VerificationResult::Valid(_) => None,
            VerificationResult::Invalid(error) => Some(error),
        }
    }

    /// Convert into a `Result` for use with `?`.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason for `Invalid`.
    pub fn into_result(self) -> Result<Claims, AuthError> {
        match self {
            VerificationResult::Valid(claims) => Ok(claims),
            VerificationResult::Invalid(error) => Err(error),
        }
    }
}

impl From<Result<Claims, AuthError>> for VerificationResult {
    fn from(result: Result<Claims, AuthError>) -> Self {
        match result {
            Ok(claims) => VerificationResult::Valid(claims),
            Err(error) => VerificationResult::Invalid(error),
        }
    }
}

/// Verifies bearer tokens against a shared key store.
pub struct TokenVerifier {
    key_store: Arc<KeyStore>,
}

impl TokenVerifier {
    /// Create a verifier backed by `key_store`.
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        Self { key_store }
    }

    /// The key store used for key resolution.
    #[must_use]
    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.key_store
    }

    /// Verify a token for the given pool.
    ///
    /// A `kid` missing from the current key set is a terminal
    /// `KeyNotFound`; see [`verify_with_rotation_retry`](Self::verify_with_rotation_retry)
    /// for the variant that refreshes once first.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as an `AuthError`.
    #[instrument(skip_all, fields(region = %issuer.region(), user_pool_id = %issuer.user_pool_id()))]
    pub async fn verify(&self, token: &str, issuer: &IssuerConfig) -> Result<Claims, AuthError> {
        let result = self.verify_once(token, issuer).await;
        record_outcome(&result);
        result
    }

    /// Verify a token, refreshing the pool's key set once if its `kid` is
    /// unknown.
    ///
    /// Picks up keys rotated in since the last fetch. A second miss is
    /// terminal.
    ///
    /// # Errors
    ///
    /// Returns the first failing check of the last attempt.
    #[instrument(skip_all, fields(region = %issuer.region(), user_pool_id = %issuer.user_pool_id()))]
    pub async fn verify_with_rotation_retry(
        &self,
        token: &str,
        issuer: &IssuerConfig,
    ) -> Result<Claims, AuthError> {
        let result = match self.verify_once(token, issuer).await {
            Err(AuthError::KeyNotFound(kid)) => {
                tracing::info!(target: "nb.auth.verifier", kid = %kid, "Unknown kid, refreshing key set");
                match self
                    .key_store
                    .force_refresh(issuer.region(), issuer.user_pool_id())
                    .await
                {
                    Ok(_) => self.verify_once(token, issuer).await,
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        record_outcome(&result);
        result
    }

    /// Verify a token given plain issuer parameters.
    ///
    /// Every failure, including missing configuration, comes back as
    /// `VerificationResult::Invalid`; nothing is retried.
    pub async fn verify_token(
        &self,
        token: &str,
        region: &str,
        user_pool_id: &str,
        audience: Option<&str>,
    ) -> VerificationResult {
        let issuer =
            match IssuerConfig::new(region, user_pool_id, audience.map(ToString::to_string)) {
                Ok(issuer) => issuer,
                Err(e) => {
                    record_verification(e.reason_code());
                    return VerificationResult::Invalid(e);
                }
            };

        self.verify(token, &issuer).await.into()
    }

    async fn verify_once(&self, token: &str, issuer: &IssuerConfig) -> Result<Claims, AuthError> {
        let parsed = parse_token(token)?;

        let key = self
            .key_store
            .get_key(issuer.region(), issuer.user_pool_id(), &parsed.header.kid)
            .await?;

        verify_signature(&parsed, &key)?;

        let claims = decode_claims(&parsed.payload)?;
        validate_claims(&claims, issuer)?;

        Ok(claims)
    }
}

fn record_outcome(result: &Result<Claims, AuthError>) {
    match result {
        Ok(_) => {
            tracing::debug!(target: "nb.auth.verifier", "Token verified");
            record_verification("valid");
        }
        Err(e) => {
            tracing::debug!(target: "nb.auth.verifier", reason = e.reason_code(), "Token rejected");
            record_verification(e.reason_code());
        }
    }
}

/// Check the algorithm and verify the RS256 signature of `parsed` under `key`.
fn verify_signature(parsed: &ParsedToken<'_>, key: &SigningKey) -> Result<(), AuthError> {
    if parsed.header.alg != SUPPORTED_ALGORITHM {
        tracing::warn!(target: "nb.auth.verifier", alg = %parsed.header.alg, "Token uses unsupported algorithm");
        return Err(AuthError::UnsupportedAlgorithm(parsed.header.alg.clone()));
    }

    if key.kty != "RSA" {
        tracing::warn!(target: "nb.auth.verifier", kty = %key.kty, kid = %parsed.header.kid, "Unexpected JWK key type");
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "key type {}",
            key.kty
        )));
    }
    if let Some(alg) = &key.alg {
        if alg != SUPPORTED_ALGORITHM {
            tracing::warn!(target: "nb.auth.verifier", alg = %alg, kid = %parsed.header.kid, "Unexpected JWK algorithm");
            return Err(AuthError::UnsupportedAlgorithm(alg.clone()));
        }
    }

    let (Some(modulus), Some(exponent)) = (key.n.as_deref(), key.e.as_deref()) else {
        tracing::error!(target: "nb.auth.verifier", kid = %parsed.header.kid, "JWK missing RSA components");
        return Err(AuthError::InvalidSignature);
    };

    let decoding_key = DecodingKey::from_rsa_components(modulus, exponent).map_err(|e| {
        tracing::error!(target: "nb.auth.verifier", kid = %parsed.header.kid, error = %e, "Invalid RSA public key");
        AuthError::InvalidSignature
    })?;

    let valid = jsonwebtoken::crypto::verify(
        parsed.signature,
        parsed.signing_input.as_bytes(),
        &decoding_key,
        Algorithm::RS256,
    )
    .map_err(|e| {
        tracing::debug!(target: "nb.auth.verifier", error = %e, "Signature check failed");
        AuthError::InvalidSignature
    })?;

    if !valid {
        tracing::debug!(target: "nb.auth.verifier", kid = %parsed.header.kid, "Signature mismatch");
        return Err(AuthError::InvalidSignature);
    }

    Ok(())
}

fn decode_claims(payload: &[u8]) -> Result<Claims, AuthError> {
    serde_json::from_slice(payload).map_err(|e| {
        tracing::debug!(target: "nb.auth.verifier", error = %e, "Failed to decode token claims");
        AuthError::MalformedToken("payload is not a valid claims object".to_string())
    })
}

/// Validate `exp`, `aud` and `iss` against the current time.
///
/// # Errors
///
/// See [`validate_claims_at`].
pub fn validate_claims(claims: &Claims, issuer: &IssuerConfig) -> Result<(), AuthError> {
    validate_claims_at(claims, issuer, chrono::Utc::now().timestamp())
}

/// Validate `exp`, `aud` and `iss` as of `now` (Unix seconds).
///
/// - `exp` must be strictly after `now`
/// - when an audience is configured, `aud` (or `client_id` for access
///   tokens) must contain it
/// - `iss`, when present, must be the pool's issuer URL
///
/// # Errors
///
/// `ExpiredToken`, `AudienceMismatch` or `IssuerMismatch`, checked in that
/// order.
pub fn validate_claims_at(
    claims: &Claims,
    issuer: &IssuerConfig,
    now: i64,
) -> Result<(), AuthError> {
    if now >= claims.exp {
        tracing::debug!(target: "nb.auth.verifier", exp = claims.exp, now, "Token expired");
        return Err(AuthError::ExpiredToken);
    }

    if let Some(audience) = issuer.audience() {
        if !claims.audience_contains(audience) {
            tracing::debug!(target: "nb.auth.verifier", "Token audience mismatch");
            return Err(AuthError::AudienceMismatch);
        }
    }

    if let Some(iss) = &claims.iss {
        if *iss != issuer.issuer_url() {
            tracing::debug!(target: "nb.auth.verifier", iss = %iss, "Token issuer mismatch");
            return Err(AuthError::IssuerMismatch);
        }
    }

    Ok(())
}
