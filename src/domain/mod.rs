//! Domain layer - Core business logic and domain models
//!
//! This module contains the submission payment state rules, gateway order
//! models, access-token models and the ports the application layer depends on.

pub mod access;
pub mod gateway;
pub mod ports;
pub mod pricing;
pub mod submission;

pub use access::{AccessClaims, AccessContext, TokenAssociation, TokenKind};
pub use gateway::{format_amount, GatewayOrder, OAuthToken, OrderRequest, WebhookHeaders};
pub use ports::{PaymentGateway, PricingOracle, SubmissionStore};
pub use pricing::{CatalogPricing, FeeSchedule};
pub use submission::{Category, GatewayStatus, LineItem, StatusChange, Submission, SubmissionId};
