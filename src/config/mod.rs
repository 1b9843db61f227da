//! Configuration management module
//!
//! This module handles loading, validation, and access to application settings.

pub mod app_config;

pub use app_config::{
    AppConfig, CleanupConfig, GatewayConfig, LoggingConfig, PriceEntry, PricingConfig, RateLimitConfig, RetryConfig,
    ServerConfig, StoreConfig, TokenConfig, WebhookConfig,
};
