//! Seams between the reconciliation core and its collaborators

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::domain::gateway::{GatewayOrder, OrderRequest, WebhookHeaders};
use crate::domain::submission::{Category, GatewayStatus, LineItem, StatusChange, Submission, SubmissionId};
use crate::shared::context::CallContext;
use crate::shared::error::AppResult;

/// Outbound calls to the payment gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, ctx: &CallContext, request: &OrderRequest) -> AppResult<GatewayOrder>;

    /// Succeeds only when the gateway answers 201 with a COMPLETED order
    async fn capture_order(&self, ctx: &CallContext, order_id: &str, request_id: &str) -> AppResult<GatewayOrder>;

    async fn get_order(&self, ctx: &CallContext, order_id: &str) -> AppResult<GatewayOrder>;

    /// Ask the gateway whether a webhook delivery is authentic; `raw_event` is the body as delivered
    async fn verify_webhook_signature(
        &self,
        ctx: &CallContext,
        headers: &WebhookHeaders,
        raw_event: &RawValue,
    ) -> AppResult<bool>;
}

/// Persistence for submission records; each method is atomic per row
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, submission: Submission) -> AppResult<()>;

    /// `AppError::NotFound` when the id is unknown
    async fn get_by_id(&self, id: &SubmissionId) -> AppResult<Submission>;

    async fn update_order(&self, id: &SubmissionId, order_id: &str, created_at: DateTime<Utc>) -> AppResult<StatusChange>;

    async fn update_capture(
        &self,
        id: &SubmissionId,
        detail: Value,
        status: GatewayStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> AppResult<StatusChange>;

    async fn update_failure_status(&self, id: &SubmissionId, status: GatewayStatus) -> AppResult<StatusChange>;

    async fn update_amount(&self, id: &SubmissionId, amount: Decimal) -> AppResult<()>;

    async fn set_access_token(&self, id: &SubmissionId, token: &str) -> AppResult<()>;

    /// Remove never-submitted drafts created before `cutoff`; returns how many went
    async fn delete_stale_drafts(&self, cutoff: DateTime<Utc>) -> AppResult<usize>;
}

/// Server-side price computation; client totals are advisory only
pub trait PricingOracle: Send + Sync {
    fn calculate_total(&self, category: Category, selections: &[LineItem], cover_fees: bool) -> AppResult<Decimal>;
}
