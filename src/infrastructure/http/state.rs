//! Service wiring shared by every route

use std::sync::Arc;

use crate::application::services::{
    AccessService, CaptureExecutor, CleanupWorker, OrderLifecycleController, RecoveryService, SubmissionService,
    WebhookIngestor,
};
use crate::config::AppConfig;
use crate::domain::ports::{PaymentGateway, PricingOracle, SubmissionStore};
use crate::infrastructure::adapters::{AccessTokenManager, MonitoringAdapter};
use crate::middleware::{RateLimitMiddleware, SecurityHeadersMiddleware};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SubmissionStore>,
    pub tokens: Arc<AccessTokenManager>,
    pub access: Arc<AccessService>,
    pub submissions: Arc<SubmissionService>,
    pub controller: Arc<OrderLifecycleController>,
    pub recovery: Arc<RecoveryService>,
    pub webhooks: Arc<WebhookIngestor>,
    pub monitoring: Arc<MonitoringAdapter>,
    pub rate_limiter: Arc<RateLimitMiddleware>,
    pub security_headers: Arc<SecurityHeadersMiddleware>,
}

impl AppState {
    /// Wire every service around the given gateway and store
    pub fn build(
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn SubmissionStore>,
        monitoring: Arc<MonitoringAdapter>,
    ) -> Self {
        let retry = config.retry_policy();
        let pricing: Arc<dyn PricingOracle> = Arc::new(config.pricing_catalog());
        let tokens = Arc::new(AccessTokenManager::new(&config.tokens));

        let executor = Arc::new(
            CaptureExecutor::new(gateway.clone(), store.clone(), retry).with_monitoring(monitoring.clone()),
        );
        let recovery = Arc::new(
            RecoveryService::new(gateway.clone(), store.clone(), executor.clone(), retry)
                .with_monitoring(monitoring.clone()),
        );
        let controller = Arc::new(
            OrderLifecycleController::new(
                gateway.clone(),
                store.clone(),
                executor,
                recovery.clone(),
                retry,
                config.gateway.currency_code.clone(),
            )
            .with_pricing(pricing.clone())
            .with_brand_name(config.gateway.brand_name.clone())
            .with_monitoring(monitoring.clone()),
        );
        let webhooks = Arc::new(
            WebhookIngestor::new(gateway, store.clone(), config.webhook.verify_signatures)
                .with_monitoring(monitoring.clone()),
        );
        let submissions = Arc::new(SubmissionService::new(store.clone(), pricing, tokens.clone()));
        let access = Arc::new(AccessService::new(tokens.clone()));
        let rate_limiter = Arc::new(RateLimitMiddleware::new(&config.rate_limit).with_monitoring(monitoring.clone()));

        Self {
            config: Arc::new(config),
            store,
            tokens,
            access,
            submissions,
            controller,
            recovery,
            webhooks,
            monitoring,
            rate_limiter,
            security_headers: Arc::new(SecurityHeadersMiddleware::new()),
        }
    }

    pub fn cleanup_worker(&self) -> CleanupWorker {
        CleanupWorker::new(self.store.clone(), self.tokens.clone(), &self.config.cleanup)
            .with_rate_limiter(self.rate_limiter.clone())
    }
}
