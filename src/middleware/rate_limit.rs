//! Per-identity rate limiting
//!
//! One keyed governor limiter shared by every mutating payment endpoint. The
//! key is the token fingerprint when the caller presents a token, otherwise
//! the forwarded client address.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::infrastructure::adapters::MonitoringAdapter;
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

pub struct RateLimitMiddleware {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    monitoring: Option<Arc<MonitoringAdapter>>,
}

impl RateLimitMiddleware {
    pub fn new(config: &RateLimitConfig) -> Self {
        let limiter = config.enabled.then(|| {
            let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
            let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
            RateLimiter::keyed(Quota::per_minute(per_minute).allow_burst(burst))
        });
        Self {
            limiter,
            monitoring: None,
        }
    }

    pub fn with_monitoring(mut self, monitoring: Arc<MonitoringAdapter>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    /// Limiter key for a request
    pub fn identity(access_token: Option<&str>, forwarded_for: Option<&str>) -> String {
        match (access_token, forwarded_for) {
            (Some(token), _) => format!("token:{}", LoggingUtils::token_fingerprint(token)),
            (None, Some(forwarded)) => {
                // first hop is the original client
                let client = forwarded.split(',').next().unwrap_or_default().trim();
                format!("ip:{}", client)
            }
            (None, None) => "ip:unknown".to_string(),
        }
    }

    pub fn check(&self, identity: &str) -> AppResult<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        if limiter.check_key(&identity.to_string()).is_err() {
            debug!(identity = %identity, "Rate limit exceeded");
            if let Some(monitoring) = &self.monitoring {
                monitoring.record_rate_limited_request();
            }
            return Err(AppError::RateLimit);
        }
        Ok(())
    }

    /// Drop idle keys so the map does not grow without bound
    pub fn retain_recent(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
        }
    }
}
