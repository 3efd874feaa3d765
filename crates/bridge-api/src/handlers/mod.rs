//! HTTP request handlers for the NebulaBridge API.

pub mod health;
pub mod me;
pub mod message;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use me::get_me;
pub use message::{get_message, post_message};
pub use metrics::metrics_handler;
