//! Observability module for the NebulaBridge API.
//!
//! Provides the Prometheus recorder and HTTP metrics helpers. Key store and
//! verification metrics are recorded by `auth-core` through the same
//! `metrics` facade.

pub mod metrics;
