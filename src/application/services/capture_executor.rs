//! Capture-with-retry path shared by the lifecycle controller and recovery

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::gateway::GatewayOrder;
use crate::domain::ports::{PaymentGateway, SubmissionStore};
use crate::domain::submission::{GatewayStatus, StatusChange, SubmissionId};
use crate::infrastructure::adapters::MonitoringAdapter;
use crate::shared::context::CallContext;
use crate::shared::error::AppResult;
use crate::shared::logging::LoggingUtils;
use crate::shared::retry::{retry_with_backoff, RetryPolicy};

pub struct CaptureExecutor {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn SubmissionStore>,
    retry: RetryPolicy,
    monitoring: Option<Arc<MonitoringAdapter>>,
}

impl CaptureExecutor {
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: Arc<dyn SubmissionStore>, retry: RetryPolicy) -> Self {
        Self {
            gateway,
            store,
            retry,
            monitoring: None,
        }
    }

    pub fn with_monitoring(mut self, monitoring: Arc<MonitoringAdapter>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    /// Capture `order_id` with retries, then persist the completed order.
    ///
    /// A local write failure after the gateway captured is logged and
    /// swallowed: the money has moved and the caller must not retry.
    pub async fn capture_and_persist(
        &self,
        ctx: &CallContext,
        submission_id: &SubmissionId,
        order_id: &str,
    ) -> AppResult<GatewayOrder> {
        // one idempotency key for every attempt of this capture
        let request_id = uuid::Uuid::new_v4().to_string();
        let request_id = request_id.as_str();
        let gateway = &self.gateway;
        let monitoring = &self.monitoring;

        let order = retry_with_backoff(
            ctx,
            &self.retry,
            "capture_order",
            move |attempt| {
                if attempt > 1 {
                    if let Some(monitoring) = monitoring {
                        monitoring.record_gateway_retry("capture_order");
                    }
                }
                gateway.capture_order(ctx, order_id, request_id)
            },
            |e| e.is_transient(),
        )
        .await?;

        info!(
            submission_id = %submission_id,
            order_id = %order_id,
            capture_id = ?order.capture_id(),
            "Gateway capture completed"
        );
        self.persist_completed(submission_id, &order).await;
        Ok(order)
    }

    /// Write a COMPLETED gateway order through to the store
    pub async fn persist_completed(&self, submission_id: &SubmissionId, order: &GatewayOrder) {
        let result = self
            .store
            .update_capture(submission_id, order.raw.clone(), GatewayStatus::Completed, Some(Utc::now()))
            .await;
        match result {
            Ok(StatusChange::Applied) => {
                LoggingUtils::log_transition(submission_id.as_str(), "pending", "COMPLETED", "capture");
            }
            Ok(StatusChange::Unchanged) => {}
            Ok(StatusChange::Refused) => {
                warn!(
                    submission_id = %submission_id,
                    order_id = %order.id,
                    "Completed capture not applied; record already settled"
                );
            }
            Err(e) => LoggingUtils::log_post_side_effect_failure(submission_id.as_str(), &order.id, &e),
        }
    }
}
