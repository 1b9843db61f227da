//! Infrastructure adapters module
//!
//! This module contains adapters for the payment gateway, access tokens,
//! submission persistence and monitoring.

pub mod access_tokens;
pub mod gateway_client;
pub mod monitoring;
pub mod submission_store;

// Re-export all adapters
pub use access_tokens::AccessTokenManager;
pub use gateway_client::GatewayClient;
pub use monitoring::MonitoringAdapter;
pub use submission_store::{InMemorySubmissionStore, RedisMirror, RowMirror};
