//! Infrastructure layer - External concerns and adapters
//!
//! Gateway client, submission store, access tokens, monitoring and the HTTP surface.

pub mod adapters;
pub mod http;

pub use adapters::{AccessTokenManager, GatewayClient, InMemorySubmissionStore, MonitoringAdapter};
