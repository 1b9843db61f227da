//! Error handling module
//!
//! This module provides centralized error handling for the application.

use thiserror::Error;

/// Application error types
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("JSON serialization error: {0}")]
    Json(String),

    /// Network-class failure talking to the gateway (connect, timeout, reset)
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-2xx status
    #[error("Gateway returned HTTP {status}: {body}")]
    Gateway { status: u16, body: String },

    /// Capture answered 201 but the decoded status was not COMPLETED
    #[error("Capture not completed, gateway status {status}")]
    CaptureIncomplete { status: String },

    #[error("Gateway unavailable after {attempts} attempts: {last_error}")]
    GatewayUnavailable { attempts: u32, last_error: String },

    #[error("Order cannot be captured, gateway status {status}")]
    OrderNotCapturable { status: String },

    #[error("Operation cancelled by caller")]
    Cancelled,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a retry of the same gateway call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Transport(_) | AppError::CaptureIncomplete { .. } => true,
            AppError::Gateway { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The gateway's `issue` code for business rejections, when present
    pub fn gateway_issue(&self) -> Option<String> {
        let AppError::Gateway { body, .. } = self else {
            return None;
        };
        let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
        parsed
            .get("details")
            .and_then(|d| d.as_array())
            .and_then(|details| details.iter().find_map(|d| d.get("issue")?.as_str()))
            .or_else(|| parsed.get("name").and_then(|n| n.as_str()))
            .map(str::to_string)
    }

    /// The gateway refused the capture because it already happened
    pub fn is_already_captured(&self) -> bool {
        matches!(self.gateway_issue().as_deref(), Some("ORDER_ALREADY_CAPTURED"))
    }

    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            AppError::Validation(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            AppError::OrderNotCapturable { .. } => StatusCode::CONFLICT,
            AppError::Gateway { status, .. } if *status < 500 => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Gateway { .. } | AppError::Transport(_) | AppError::CaptureIncomplete { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AppError::GatewayUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code for JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Authentication(_) => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::RateLimit => "rate_limited",
            AppError::Json(_) => "malformed_json",
            AppError::Transport(_) => "gateway_transport",
            AppError::Gateway { .. } => "gateway_rejected",
            AppError::CaptureIncomplete { .. } => "capture_incomplete",
            AppError::GatewayUnavailable { .. } => "gateway_unavailable",
            AppError::OrderNotCapturable { .. } => "order_not_capturable",
            AppError::Cancelled => "cancelled",
            AppError::Persistence(_) => "persistence",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

// Implement warp::reject::Reject for AppError
impl warp::reject::Reject for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Persistence(err.to_string())
    }
}
