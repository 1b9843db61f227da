//! HTTP routes module
//!
//! Route groups for the payment API, the gateway webhook and health checks.

pub mod builder;
pub mod health;
pub mod payments;
pub mod webhooks;

pub use builder::{handle_rejection, RouteBuilder};
pub use health::HealthRoutes;
pub use payments::PaymentsRoutes;
pub use webhooks::WebhookRoutes;
