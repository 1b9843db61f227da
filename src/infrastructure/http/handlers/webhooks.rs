//! Gateway webhook handler

use bytes::Bytes;
use warp::http::HeaderMap;
use warp::reply::Response;

use crate::infrastructure::http::state::AppState;
use crate::middleware::add_security_headers_to_response;
use crate::shared::context::CallContext;

/// The gateway only reads the status code, so replies carry no body
pub async fn handle_webhook(body: Bytes, headers: HeaderMap, state: AppState) -> Result<Response, warp::Rejection> {
    let ctx = CallContext::background().with_timeout(state.config.request_timeout());
    let status = state.webhooks.handle(&ctx, &body, &headers).await;
    let reply = warp::reply::with_status(warp::reply(), status);
    Ok(add_security_headers_to_response(reply, &state.security_headers))
}
