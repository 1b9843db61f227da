//! Route builder module
//!
//! Combines every route group and turns warp rejections into JSON errors.

use std::convert::Infallible;

use serde_json::json;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Filter;

use crate::infrastructure::http::routes::{HealthRoutes, PaymentsRoutes, WebhookRoutes};
use crate::infrastructure::http::state::AppState;
use crate::middleware::{create_json_response_with_security_headers, SecurityHeadersMiddleware};

/// Route builder that orchestrates the creation of all application routes
pub struct RouteBuilder;

impl RouteBuilder {
    pub fn build_routes(state: AppState) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
        let payments = PaymentsRoutes::create_routes(state.clone());
        let webhooks = WebhookRoutes::create_webhook_route(state.clone());
        let health = HealthRoutes::create_health_route(state.clone());
        let metrics = HealthRoutes::create_prometheus_route(state);

        payments
            .or(webhooks)
            .or(health)
            .or(metrics)
            .recover(handle_rejection)
    }
}

/// Map filter rejections onto the same error body the handlers use
pub async fn handle_rejection(rejection: warp::Rejection) -> Result<Response, Infallible> {
    let (status, code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "no such route".to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", "request body too large".to_string())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "malformed_json", e.to_string())
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", "expected application/json".to_string())
    } else if rejection.find::<warp::reject::InvalidHeader>().is_some() {
        (StatusCode::BAD_REQUEST, "validation", "malformed header".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "method not allowed".to_string())
    } else {
        tracing::error!(rejection = ?rejection, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error".to_string())
    };

    Ok(create_json_response_with_security_headers(
        &json!({ "error": code, "message": message }),
        status,
        &SecurityHeadersMiddleware::new(),
    ))
}
