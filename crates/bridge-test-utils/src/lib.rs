//! # NebulaBridge Test Utilities
//!
//! Shared test utilities for `auth-core` and `bridge-api`.
//!
//! This crate provides:
//! - Fixed RSA fixtures (two RS256 keypairs with known JWK components)
//! - Token builders (`TestTokenBuilder`) and forged-token helpers
//! - A mock Cognito JWKS endpoint (`TestJwksServer`)
//! - Server test harness (`TestBridgeServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestBridgeServer::spawn().await?;
//!     let token = TestTokenBuilder::new().sign_with(server.signing_key());
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use server_harness::*;
pub use token_builders::*;
