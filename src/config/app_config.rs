//! Application configuration structures
//!
//! This module contains the main configuration structures for the application.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use validator::Validate;

use crate::domain::pricing::{CatalogPricing, FeeSchedule};
use crate::domain::submission::Category;
use crate::shared::error::{AppError, AppResult};
use crate::shared::retry::RetryPolicy;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server address to bind to
    pub bind_address: IpAddr,

    /// Server port
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Maximum request size in bytes
    #[validate(range(min = 1024, max = 10485760))] // 1KB to 10MB
    pub max_request_size: usize,

    /// Upper bound on one request, including every gateway retry
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_seconds: u64,
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    /// REST base URL, e.g. "https://api-m.sandbox.paypal.com"
    #[validate(url)]
    pub base_url: String,

    #[validate(length(min = 1))]
    pub client_id: String,

    #[validate(length(min = 1))]
    pub client_secret: String,

    /// Id of the registered webhook, required by the signature verification call
    pub webhook_id: String,

    /// Per-call timeout in seconds
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,

    /// Refresh the bearer credential this many seconds before it expires
    #[validate(range(min = 0, max = 3600))]
    pub token_refresh_margin_seconds: u64,

    #[validate(length(equal = 3))]
    pub currency_code: String,

    pub brand_name: Option<String>,
}

/// Retry policy for gateway calls
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    /// Linear backoff base; attempt n waits n * base
    #[validate(range(min = 0, max = 60000))]
    pub base_interval_ms: u64,
}

/// Access token configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TokenConfig {
    /// HMAC signing secret
    #[validate(length(min = 32))]
    pub secret_key: String,

    /// Maximum age of a user token in seconds
    #[validate(range(min = 60, max = 604800))]
    pub max_age_seconds: u64,

    /// Fixed subject id every admin token must carry
    #[validate(length(min = 1))]
    pub admin_subject: String,

    #[validate(range(min = 60, max = 604800))]
    pub admin_max_age_seconds: u64,

    /// When set, admin requests must carry a Referer starting with this prefix
    pub admin_referer_prefix: Option<String>,
}

/// Webhook ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebhookConfig {
    /// If false, then signatures are not verified and every delivery is accepted
    pub verify_signatures: bool,

    #[validate(range(min = 1024, max = 10485760))]
    pub max_body_size: usize,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Requests per minute per identity
    #[validate(range(min = 1, max = 10000))]
    pub requests_per_minute: u32,

    /// Burst size
    #[validate(range(min = 1, max = 1000))]
    pub burst_size: u32,

    /// Enable rate limiting
    pub enabled: bool,
}

/// Background cleanup configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CleanupConfig {
    #[validate(range(min = 10, max = 86400))]
    pub interval_seconds: u64,

    /// Drafts older than this are deleted
    #[validate(range(min = 1, max = 8760))]
    pub draft_max_age_hours: u64,
}

/// Submission store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct StoreConfig {
    /// Optional Redis URL; records are mirrored there when set
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PriceEntry {
    pub category: Category,
    #[validate(length(min = 1))]
    pub sku: String,
    pub unit_price: Decimal,
}

/// Pricing catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PricingConfig {
    #[validate(nested)]
    pub items: Vec<PriceEntry>,

    /// Fractional fee percentage applied when the payer covers fees
    pub fee_percent: Decimal,

    pub fee_fixed: Decimal,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level
    #[validate(length(min = 1))]
    pub level: String,

    /// Log format: "json" or "pretty"
    #[validate(length(min = 1))]
    pub format: String,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub retry: RetryConfig,
    pub tokens: TokenConfig,
    pub webhook: WebhookConfig,
    pub rate_limit: RateLimitConfig,
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: IpAddr::from([127, 0, 0, 1]),
                port: 8080,
                max_request_size: 64 * 1024,
                request_timeout_seconds: 120,
            },
            gateway: GatewayConfig {
                base_url: "https://api-m.sandbox.paypal.com".to_string(),
                client_id: "sandbox-client-id".to_string(),
                client_secret: "sandbox-client-secret".to_string(),
                webhook_id: String::new(),
                timeout_seconds: 30,
                token_refresh_margin_seconds: 60,
                currency_code: "USD".to_string(),
                brand_name: None,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_interval_ms: 1000,
            },
            tokens: TokenConfig {
                secret_key: "change-me-access-token-secret-32-chars-min".to_string(),
                max_age_seconds: 3600,
                admin_subject: "admin".to_string(),
                admin_max_age_seconds: 8 * 3600,
                admin_referer_prefix: None,
            },
            webhook: WebhookConfig {
                verify_signatures: true,
                max_body_size: 256 * 1024,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: 60,
                burst_size: 10,
                enabled: true,
            },
            cleanup: CleanupConfig {
                interval_seconds: 900,
                draft_max_age_hours: 48,
            },
            store: StoreConfig::default(),
            pricing: PricingConfig {
                items: vec![],
                fee_percent: Decimal::new(29, 3),
                fee_fixed: Decimal::new(30, 2),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("Conf").required(false))
            .add_source(config::Environment::with_prefix("PAYMENTS").separator("__"))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;

        config
            .validate_config()
            .map_err(|e| AppError::Validation(format!("Configuration validation failed: {}", e)))?;

        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.server.validate()?;
        self.gateway.validate()?;
        self.retry.validate()?;
        self.tokens.validate()?;
        self.webhook.validate()?;
        self.rate_limit.validate()?;
        self.cleanup.validate()?;
        self.store.validate()?;
        self.pricing.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts, Duration::from_millis(self.retry.base_interval_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    pub fn pricing_catalog(&self) -> CatalogPricing {
        let fees = FeeSchedule {
            percent: self.pricing.fee_percent,
            fixed: self.pricing.fee_fixed,
        };
        self.pricing
            .items
            .iter()
            .fold(CatalogPricing::new(fees), |catalog, entry| {
                catalog.with_price(entry.category, &entry.sku, entry.unit_price)
            })
    }
}
