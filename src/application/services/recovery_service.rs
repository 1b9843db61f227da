//! Recovery service
//!
//! Queries the gateway for the true order state and drives the local record
//! back into agreement. Every branch overwrites with the same terminal
//! values, so running it again for the same order changes nothing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::services::capture_executor::CaptureExecutor;
use crate::domain::gateway::GatewayOrder;
use crate::domain::ports::{PaymentGateway, SubmissionStore};
use crate::domain::submission::{GatewayStatus, StatusChange, SubmissionId};
use crate::infrastructure::adapters::MonitoringAdapter;
use crate::shared::context::CallContext;
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;
use crate::shared::retry::{retry_with_backoff, RetryPolicy};

/// What recovery found at the gateway and did about it
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// Gateway already had the order completed; written through locally
    Completed(GatewayOrder),
    /// Order was approved and recovery captured it
    Captured(GatewayOrder),
    /// Customer has not approved yet
    Pending(GatewayStatus),
    /// Order cancelled or expired; the record now carries a `FAILED_*` marker
    Failed(GatewayStatus),
    /// Status recovery does not act on
    Unknown(GatewayStatus),
}

impl RecoveryOutcome {
    pub fn branch(&self) -> &'static str {
        match self {
            RecoveryOutcome::Completed(_) => "completed",
            RecoveryOutcome::Captured(_) => "captured",
            RecoveryOutcome::Pending(_) => "pending",
            RecoveryOutcome::Failed(_) => "failed",
            RecoveryOutcome::Unknown(_) => "unknown",
        }
    }

    /// The completed gateway order, when recovery settled the payment
    pub fn completed_order(&self) -> Option<&GatewayOrder> {
        match self {
            RecoveryOutcome::Completed(order) | RecoveryOutcome::Captured(order) => Some(order),
            _ => None,
        }
    }
}

pub struct RecoveryService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn SubmissionStore>,
    executor: Arc<CaptureExecutor>,
    retry: RetryPolicy,
    monitoring: Option<Arc<MonitoringAdapter>>,
}

impl RecoveryService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn SubmissionStore>,
        executor: Arc<CaptureExecutor>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            store,
            executor,
            retry,
            monitoring: None,
        }
    }

    pub fn with_monitoring(mut self, monitoring: Arc<MonitoringAdapter>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    async fn fetch_order(&self, ctx: &CallContext, order_id: &str) -> AppResult<GatewayOrder> {
        let gateway = &self.gateway;
        retry_with_backoff(
            ctx,
            &self.retry,
            "get_order",
            move |_| gateway.get_order(ctx, order_id),
            |e| e.is_transient(),
        )
        .await
    }

    /// Reconcile one submission against the gateway's view of `order_id`
    pub async fn recover(
        &self,
        ctx: &CallContext,
        submission_id: &SubmissionId,
        order_id: &str,
    ) -> AppResult<RecoveryOutcome> {
        let order = self.fetch_order(ctx, order_id).await?;
        let outcome = match order.status.clone() {
            GatewayStatus::Completed => {
                self.executor.persist_completed(submission_id, &order).await;
                RecoveryOutcome::Completed(order)
            }
            GatewayStatus::Approved => self.capture_approved(ctx, submission_id, order_id).await?,
            status @ (GatewayStatus::Created | GatewayStatus::Saved | GatewayStatus::PayerActionRequired) => {
                RecoveryOutcome::Pending(status)
            }
            status @ (GatewayStatus::Cancelled | GatewayStatus::Expired) => {
                let marker = GatewayStatus::failed_from(&status);
                match self.store.update_failure_status(submission_id, marker.clone()).await? {
                    StatusChange::Applied => {
                        LoggingUtils::log_transition(submission_id.as_str(), status.as_string().as_str(), &marker.as_string(), "recovery");
                    }
                    StatusChange::Refused => {
                        warn!(submission_id = %submission_id, status = %status, "Failure marker refused on settled record");
                    }
                    StatusChange::Unchanged => {}
                }
                RecoveryOutcome::Failed(status)
            }
            status => {
                warn!(submission_id = %submission_id, order_id = %order_id, status = %status, "Unrecognised gateway status; leaving record untouched");
                RecoveryOutcome::Unknown(status)
            }
        };

        info!(
            submission_id = %submission_id,
            order_id = %order_id,
            branch = outcome.branch(),
            "Recovery finished"
        );
        if let Some(monitoring) = &self.monitoring {
            monitoring.record_recovery(outcome.branch());
        }
        Ok(outcome)
    }

    async fn capture_approved(
        &self,
        ctx: &CallContext,
        submission_id: &SubmissionId,
        order_id: &str,
    ) -> AppResult<RecoveryOutcome> {
        match self.executor.capture_and_persist(ctx, submission_id, order_id).await {
            Ok(order) => Ok(RecoveryOutcome::Captured(order)),
            // a concurrent caller won the capture; converge on its result
            Err(e) if e.is_already_captured() => {
                let order = self.fetch_order(ctx, order_id).await?;
                if order.status.is_completed() {
                    self.executor.persist_completed(submission_id, &order).await;
                    Ok(RecoveryOutcome::Completed(order))
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Recover using the order id stored on the submission
    pub async fn recover_submission(&self, ctx: &CallContext, submission_id: &SubmissionId) -> AppResult<RecoveryOutcome> {
        let submission = self.store.get_by_id(submission_id).await?;
        let order_id = submission
            .gateway_order_id
            .ok_or_else(|| AppError::Validation(format!("submission {} has no gateway order", submission_id)))?;
        self.recover(ctx, submission_id, &order_id).await
    }
}
