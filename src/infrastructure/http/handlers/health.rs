//! Health and metrics handlers

use chrono::Utc;
use serde_json::json;
use warp::http::header::{HeaderValue, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

use crate::infrastructure::http::handlers::{error_reply, json_reply};
use crate::infrastructure::http::state::AppState;

/// Liveness check
pub async fn handle_health_request(state: AppState) -> Result<Response, warp::Rejection> {
    let body = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(json_reply(&state, &body, StatusCode::OK))
}

/// Prometheus text exposition
pub async fn handle_prometheus_request(state: AppState) -> Result<Response, warp::Rejection> {
    match state.monitoring.get_prometheus_metrics() {
        Ok(metrics) => {
            let mut response = warp::reply::with_status(metrics, StatusCode::OK).into_response();
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
            Ok(response)
        }
        Err(e) => Ok(error_reply(&state, &e)),
    }
}
