//! Bearer token verification against a Cognito user pool.
//!
//! The crate is split into a [`jwks::KeyStore`], which fetches and caches the
//! pool's published signing keys, and a [`verifier::TokenVerifier`], which
//! runs the parse → key lookup → signature → claims pipeline for a token.
//!
//! ```rust,ignore
//! use auth_core::{IssuerConfig, KeyStore, TokenVerifier};
//! use std::sync::Arc;
//!
//! let verifier = TokenVerifier::new(Arc::new(KeyStore::with_defaults()));
//! let issuer = IssuerConfig::new("us-east-1", "us-east-1_AbCdEf", Some("client-id".into()))?;
//! let claims = verifier.verify(token, &issuer).await?;
//! ```

#![warn(clippy::pedantic)]

/// Verified token claims
pub mod claims;

/// Issuer parameters (region, user pool, audience)
pub mod config;

/// Verification error taxonomy
pub mod error;

/// JWKS fetching and per-pool key caching
pub mod jwks;

/// Key store and verification counters
pub mod metrics;

/// Compact token parsing
pub mod token;

/// Token verification pipeline
pub mod verifier;

pub use claims::{Audience, Claims};
pub use config::IssuerConfig;
pub use error::{AuthError, FailureKind};
pub use jwks::{KeySet, KeyStore, KeyStoreConfig, SigningKey};
pub use verifier::{TokenVerifier, VerificationResult};
