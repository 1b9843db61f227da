//! HTTP handlers module
//!
//! Handlers translate requests into service calls and every outcome,
//! including errors, into a JSON response with security headers.

pub mod health;
pub mod payments;
pub mod webhooks;

pub use health::{handle_health_request, handle_prometheus_request};
pub use payments::{
    handle_capture_order, handle_create_order, handle_create_submission, handle_get_submission, handle_recover,
};
pub use webhooks::handle_webhook;

use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::reply::Response;

use crate::infrastructure::http::state::AppState;
use crate::middleware::create_json_response_with_security_headers;
use crate::shared::error::{AppError, AppResult};

pub(crate) fn json_reply<T: Serialize>(state: &AppState, data: &T, status: StatusCode) -> Response {
    create_json_response_with_security_headers(data, status, &state.security_headers)
}

/// Client-facing message; gateway bodies and internal details stay in the logs
fn public_message(err: &AppError) -> String {
    match err {
        AppError::Gateway { .. } => "payment gateway rejected the request".to_string(),
        AppError::Transport(_) | AppError::CaptureIncomplete { .. } => "payment gateway error".to_string(),
        AppError::GatewayUnavailable { .. } => "payment gateway unavailable, try again later".to_string(),
        AppError::Config(_) | AppError::Persistence(_) | AppError::Internal(_) => "internal error".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn error_reply(state: &AppState, err: &AppError) -> Response {
    let status = err.http_status_code();
    if status.is_server_error() {
        error!(error = %err, code = err.code(), "Request failed");
    } else {
        warn!(error = %err, code = err.code(), "Request rejected");
    }
    json_reply(
        state,
        &json!({ "error": err.code(), "message": public_message(err) }),
        status,
    )
}

pub(crate) fn respond(state: &AppState, result: AppResult<Response>) -> Response {
    result.unwrap_or_else(|e| error_reply(state, &e))
}
