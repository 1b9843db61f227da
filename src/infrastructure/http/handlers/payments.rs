//! Payments HTTP handlers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::reply::Response;

use crate::application::services::{Credentials, NewSubmission};
use crate::domain::access::AccessContext;
use crate::domain::submission::{Category, GatewayStatus, Submission, SubmissionId};
use crate::infrastructure::http::handlers::{json_reply, respond};
use crate::infrastructure::http::state::AppState;
use crate::middleware::RateLimitMiddleware;
use crate::shared::context::CallContext;
use crate::shared::error::AppResult;

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRequest {
    pub order_id: String,
}

/// Request headers the payment routes read
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    pub access_token: Option<String>,
    pub authorization: Option<String>,
    pub referer: Option<String>,
    pub forwarded_for: Option<String>,
}

impl RequestHeaders {
    fn credentials(&self) -> Credentials<'_> {
        Credentials {
            access_token: self.access_token.as_deref(),
            authorization: self.authorization.as_deref(),
            referer: self.referer.as_deref(),
        }
    }

    fn rate_limit_identity(&self) -> String {
        RateLimitMiddleware::identity(self.access_token.as_deref(), self.forwarded_for.as_deref())
    }
}

#[derive(Debug, Serialize)]
struct SubmissionView {
    submission_id: SubmissionId,
    category: Category,
    calculated_amount: Decimal,
    gateway_order_id: Option<String>,
    gateway_status: GatewayStatus,
    capture_id: Option<String>,
    gateway_fee: Option<Decimal>,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway_detail: Option<Value>,
}

impl SubmissionView {
    fn new(submission: Submission, include_detail: bool) -> Self {
        Self {
            capture_id: submission.capture_id(),
            gateway_fee: submission.gateway_fee(),
            submission_id: submission.id,
            category: submission.category,
            calculated_amount: submission.calculated_amount,
            gateway_order_id: submission.gateway_order_id,
            gateway_status: submission.gateway_status,
            created_at: submission.created_at,
            submitted_at: submission.submitted_at,
            gateway_detail: submission.gateway_detail.filter(|_| include_detail),
        }
    }
}

fn request_context(state: &AppState) -> CallContext {
    CallContext::background().with_timeout(state.config.request_timeout())
}

pub async fn handle_create_submission(
    body: NewSubmission,
    headers: RequestHeaders,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    let result: AppResult<Response> = async {
        state.rate_limiter.check(&headers.rate_limit_identity())?;
        let receipt = state.submissions.create(body).await?;
        Ok(json_reply(&state, &receipt, StatusCode::CREATED))
    }
    .await;
    Ok(respond(&state, result))
}

pub async fn handle_create_order(
    id: String,
    headers: RequestHeaders,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    let result: AppResult<Response> = async {
        let submission_id = SubmissionId::parse(&id)?;
        let context = state.access.resolve_access_context(&headers.credentials())?;
        state.rate_limiter.check(&headers.rate_limit_identity())?;
        state.access.authorize_order(&context, &submission_id).await?;

        let ctx = request_context(&state);
        let order_id = state.controller.create_order(&ctx, &submission_id).await?;
        Ok(json_reply(&state, &json!({ "order_id": order_id }), StatusCode::OK))
    }
    .await;
    Ok(respond(&state, result))
}

pub async fn handle_capture_order(
    id: String,
    body: CaptureRequest,
    headers: RequestHeaders,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    let result: AppResult<Response> = async {
        let submission_id = SubmissionId::parse(&id)?;
        let context = state.access.resolve_access_context(&headers.credentials())?;
        state.rate_limiter.check(&headers.rate_limit_identity())?;
        let token = state.access.begin_capture(&context, &submission_id).await?;

        let ctx = request_context(&state);
        let captured = state.controller.capture_order(&ctx, &submission_id, &body.order_id).await;
        let settled = matches!(&captured, Ok(result) if result.status.is_terminal());
        if !settled {
            state.access.abort_capture(&token).await;
        }
        Ok(json_reply(&state, &captured?, StatusCode::OK))
    }
    .await;
    Ok(respond(&state, result))
}

pub async fn handle_get_submission(
    id: String,
    headers: RequestHeaders,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    let result: AppResult<Response> = async {
        let submission_id = SubmissionId::parse(&id)?;
        let context = state.access.resolve_access_context(&headers.credentials())?;
        let submission = state.store.get_by_id(&submission_id).await?;
        state.access.authorize_read(&context, &submission).await?;
        let view = SubmissionView::new(submission, context.is_admin());
        Ok(json_reply(&state, &view, StatusCode::OK))
    }
    .await;
    Ok(respond(&state, result))
}

pub async fn handle_recover(
    id: String,
    headers: RequestHeaders,
    state: AppState,
) -> Result<Response, warp::Rejection> {
    let result: AppResult<Response> = async {
        let submission_id = SubmissionId::parse(&id)?;
        let context = state.access.resolve_access_context(&headers.credentials())?;
        state.access.require_admin(&context)?;
        if let AccessContext::Admin { subject } = &context {
            tracing::info!(submission_id = %submission_id, admin = %subject, "Admin triggered recovery");
        }

        let ctx = request_context(&state);
        let outcome = state.recovery.recover_submission(&ctx, &submission_id).await?;
        let submission = state.store.get_by_id(&submission_id).await?;
        Ok(json_reply(
            &state,
            &json!({
                "branch": outcome.branch(),
                "submission": SubmissionView::new(submission, true),
            }),
            StatusCode::OK,
        ))
    }
    .await;
    Ok(respond(&state, result))
}
