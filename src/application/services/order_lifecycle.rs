//! Order lifecycle controller
//!
//! Drives a submission through order creation and capture. Both entry points
//! short-circuit when the work is already done, and every gateway call goes
//! through the shared retry wrapper.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::services::capture_executor::CaptureExecutor;
use crate::application::services::recovery_service::{RecoveryOutcome, RecoveryService};
use crate::domain::gateway::{GatewayOrder, OrderRequest};
use crate::domain::ports::{PaymentGateway, PricingOracle, SubmissionStore};
use crate::domain::submission::{GatewayStatus, StatusChange, Submission, SubmissionId};
use crate::infrastructure::adapters::MonitoringAdapter;
use crate::shared::context::CallContext;
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;
use crate::shared::retry::{retry_with_backoff, RetryPolicy};

/// Where a capture result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// Submission was already COMPLETED locally; no gateway call
    Cached,
    /// Recovery found the order already settled at the gateway
    Recovered,
    /// This call performed the capture
    Captured,
}

impl CaptureSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureSource::Cached => "cached",
            CaptureSource::Recovered => "recovered",
            CaptureSource::Captured => "captured",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureResult {
    pub submission_id: SubmissionId,
    pub order_id: String,
    pub status: GatewayStatus,
    pub capture_id: Option<String>,
    pub detail: Option<Value>,
    pub source: CaptureSource,
}

impl CaptureResult {
    fn from_submission(submission: &Submission) -> Self {
        Self {
            submission_id: submission.id.clone(),
            order_id: submission.gateway_order_id.clone().unwrap_or_default(),
            status: submission.gateway_status.clone(),
            capture_id: submission.capture_id(),
            detail: submission.gateway_detail.clone(),
            source: CaptureSource::Cached,
        }
    }

    fn from_order(submission_id: &SubmissionId, order: &GatewayOrder, source: CaptureSource) -> Self {
        Self {
            submission_id: submission_id.clone(),
            order_id: order.id.clone(),
            status: order.status.clone(),
            capture_id: order.capture_id(),
            detail: Some(order.raw.clone()),
            source,
        }
    }
}

pub struct OrderLifecycleController {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn SubmissionStore>,
    pricing: Option<Arc<dyn PricingOracle>>,
    executor: Arc<CaptureExecutor>,
    recovery: Arc<RecoveryService>,
    retry: RetryPolicy,
    currency_code: String,
    brand_name: Option<String>,
    monitoring: Option<Arc<MonitoringAdapter>>,
}

impl OrderLifecycleController {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn SubmissionStore>,
        executor: Arc<CaptureExecutor>,
        recovery: Arc<RecoveryService>,
        retry: RetryPolicy,
        currency_code: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            pricing: None,
            executor,
            recovery,
            retry,
            currency_code: currency_code.into(),
            brand_name: None,
            monitoring: None,
        }
    }

    /// Recompute amounts server-side before every order creation
    pub fn with_pricing(mut self, pricing: Arc<dyn PricingOracle>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn with_brand_name(mut self, brand_name: Option<String>) -> Self {
        self.brand_name = brand_name;
        self
    }

    pub fn with_monitoring(mut self, monitoring: Arc<MonitoringAdapter>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    /// Create the gateway order for a submission, or return the one it already has
    pub async fn create_order(&self, ctx: &CallContext, submission_id: &SubmissionId) -> AppResult<String> {
        let mut submission = self.store.get_by_id(submission_id).await?;
        if let Some(existing) = &submission.gateway_order_id {
            debug!(submission_id = %submission_id, order_id = %existing, "Order already exists");
            return Ok(existing.clone());
        }
        if submission.gateway_status.is_terminal() {
            return Err(AppError::Validation(format!(
                "submission {} is already {}",
                submission_id, submission.gateway_status
            )));
        }

        if let Some(pricing) = &self.pricing {
            let amount = pricing.calculate_total(submission.category, &submission.selections, submission.cover_fees)?;
            if amount != submission.calculated_amount {
                warn!(
                    submission_id = %submission_id,
                    stored = %submission.calculated_amount,
                    recomputed = %amount,
                    "Stored amount differs from recomputed total"
                );
                self.store.update_amount(submission_id, amount).await?;
                submission.calculated_amount = amount;
            }
        }
        if submission.calculated_amount <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "amount must be positive, got {}",
                submission.calculated_amount
            )));
        }

        let request = OrderRequest::for_submission(&submission, &self.currency_code, self.brand_name.as_deref());
        let request = &request;
        let gateway = &self.gateway;
        let monitoring = &self.monitoring;
        let order = retry_with_backoff(
            ctx,
            &self.retry,
            "create_order",
            move |attempt| {
                if attempt > 1 {
                    if let Some(monitoring) = monitoring {
                        monitoring.record_gateway_retry("create_order");
                    }
                }
                gateway.create_order(ctx, request)
            },
            |e| e.is_transient(),
        )
        .await?;

        match self.store.update_order(submission_id, &order.id, Utc::now()).await? {
            StatusChange::Refused => {
                // a concurrent call stored its order first; the row's order wins
                let current = self.store.get_by_id(submission_id).await?;
                return match current.gateway_order_id {
                    Some(stored) => {
                        warn!(
                            submission_id = %submission_id,
                            stored = %stored,
                            discarded = %order.id,
                            "Concurrent order creation; keeping the stored order"
                        );
                        Ok(stored)
                    }
                    None => Err(AppError::Validation(format!(
                        "submission {} settled while creating order",
                        submission_id
                    ))),
                };
            }
            StatusChange::Applied => {
                LoggingUtils::log_transition(submission_id.as_str(), &submission.gateway_status.as_string(), "CREATED", "create_order");
            }
            StatusChange::Unchanged => {}
        }
        info!(
            submission_id = %submission_id,
            order_id = %order.id,
            amount = %request.amount_value,
            "Gateway order created"
        );
        Ok(order.id)
    }

    /// Capture the approved order for a submission.
    ///
    /// Exhausted retries surface as `GatewayUnavailable` and leave the record
    /// untouched, since the gateway may still settle it via webhook.
    pub async fn capture_order(
        &self,
        ctx: &CallContext,
        submission_id: &SubmissionId,
        order_id: &str,
    ) -> AppResult<CaptureResult> {
        let submission = self.store.get_by_id(submission_id).await?;
        if submission.gateway_status.is_terminal() {
            self.record_capture(CaptureSource::Cached);
            return Ok(CaptureResult::from_submission(&submission));
        }
        match submission.gateway_order_id.as_deref() {
            None => {
                return Err(AppError::Validation(format!("submission {} has no gateway order", submission_id)));
            }
            Some(stored) if stored != order_id => {
                return Err(AppError::Validation("order id does not belong to this submission".into()));
            }
            Some(_) => {}
        }

        match self.recovery.recover(ctx, submission_id, order_id).await {
            Ok(RecoveryOutcome::Completed(order)) => return Ok(self.finish(submission_id, &order, CaptureSource::Recovered)),
            Ok(RecoveryOutcome::Captured(order)) => return Ok(self.finish(submission_id, &order, CaptureSource::Captured)),
            Ok(RecoveryOutcome::Failed(status)) => {
                return Err(AppError::OrderNotCapturable { status: status.as_string() });
            }
            Ok(RecoveryOutcome::Pending(_)) | Ok(RecoveryOutcome::Unknown(_)) => {}
            Err(AppError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => {
                warn!(submission_id = %submission_id, order_id = %order_id, error = %e, "Pre-capture recovery failed; capturing directly");
            }
        }

        match self.executor.capture_and_persist(ctx, submission_id, order_id).await {
            Ok(order) => Ok(self.finish(submission_id, &order, CaptureSource::Captured)),
            Err(e) if e.is_already_captured() => {
                info!(submission_id = %submission_id, order_id = %order_id, "Order captured concurrently; converging via recovery");
                let outcome = self.recovery.recover(ctx, submission_id, order_id).await?;
                match outcome.completed_order() {
                    Some(order) => Ok(self.finish(submission_id, order, CaptureSource::Recovered)),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&self, submission_id: &SubmissionId, order: &GatewayOrder, source: CaptureSource) -> CaptureResult {
        self.record_capture(source);
        CaptureResult::from_order(submission_id, order, source)
    }

    fn record_capture(&self, source: CaptureSource) {
        if let Some(monitoring) = &self.monitoring {
            monitoring.record_capture(source.as_str());
        }
    }
}
