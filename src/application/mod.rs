//! Application layer - Use cases and application services
//!
//! This module contains the services that orchestrate the payment
//! reconciliation use cases over the domain ports.

pub mod services;

pub use services::*;
