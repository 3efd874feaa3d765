//! NebulaBridge API Library
//!
//! HTTP front end that authenticates requests with Cognito user pool tokens
//! and answers with a greeting or an echo of the posted text.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs
//!                        |
//!                        v
//!              auth_core::TokenVerifier -> auth_core::KeyStore -> Cognito JWKS
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Request and response bodies
//! - `observability` - Prometheus recorder and HTTP metrics
//! - `routes` - Axum router setup

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
