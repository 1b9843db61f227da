//! Payment reconciliation service for registration and donation forms
//!
//! Creates and captures gateway orders for priced submissions, ingests the
//! gateway's webhooks and recovers orders whose outcome was lost, converging
//! every path on the same submission state rules.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod middleware;
pub mod shared;


pub use config::AppConfig;
pub use infrastructure::http::HttpServer;
pub use shared::error::{AppError, AppResult};
