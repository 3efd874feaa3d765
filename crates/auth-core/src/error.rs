//! Token verification errors.
//!
//! Each failure cause keeps its own variant all the way to the caller. The
//! HTTP layer decides how much of it a client gets to see; detail for
//! operators stays in the logs.

use thiserror::Error;

/// How a failure should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The presented credential is not acceptable (maps to 401).
    Unauthorized,

    /// The identity provider could not be reached (maps to 503).
    Unavailable,

    /// The deployment is misconfigured (maps to 500).
    Misconfigured,
}

/// Errors that can occur while verifying a bearer token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token is not a well-formed compact JWT.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Token or key uses an algorithm other than RS256.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No key with the token's `kid` exists in the pool's key set.
    #[error("Signing key not found: {0}")]
    KeyNotFound(String),

    /// The key set could not be fetched or parsed.
    #[error("Key fetch failed: {0}")]
    KeyFetch(String),

    /// Signature does not verify under the resolved key.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token `exp` is not in the future.
    #[error("Token has expired")]
    ExpiredToken,

    /// Token audience does not include the configured client.
    #[error("Token audience does not match")]
    AudienceMismatch,

    /// Token `iss` names a different user pool.
    #[error("Token issuer does not match")]
    IssuerMismatch,

    /// Issuer parameters are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Classify this error for the caller.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            AuthError::KeyFetch(_) => FailureKind::Unavailable,
            AuthError::Configuration(_) => FailureKind::Misconfigured,
            AuthError::MalformedToken(_)
            | AuthError::UnsupportedAlgorithm(_)
            | AuthError::KeyNotFound(_)
            | AuthError::InvalidSignature
            | AuthError::ExpiredToken
            | AuthError::AudienceMismatch
            | AuthError::IssuerMismatch => FailureKind::Unauthorized,
        }
    }

    /// Stable, bounded identifier for logs and metric labels.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::KeyFetch(_) => "key_fetch",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::ExpiredToken => "expired_token",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::Configuration(_) => "configuration",
        }
    }
}
