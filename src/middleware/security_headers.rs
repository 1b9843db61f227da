use serde::Serialize;
use warp::http::header::{HeaderName, HeaderValue};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// Headers attached to every API response
pub struct SecurityHeadersMiddleware {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeadersMiddleware {
    pub fn new() -> Self {
        let headers = [
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "DENY"),
            ("referrer-policy", "no-referrer"),
            ("cache-control", "no-store"),
            ("content-security-policy", "default-src 'none'; frame-ancestors 'none'"),
        ]
        .into_iter()
        .map(|(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
        .collect();
        Self { headers }
    }

    pub fn apply(&self, mut response: Response) -> Response {
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}

impl Default for SecurityHeadersMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON body with the given status and the security headers applied
pub fn create_json_response_with_security_headers<T: Serialize>(
    data: &T,
    status: StatusCode,
    middleware: &SecurityHeadersMiddleware,
) -> Response {
    let response = warp::reply::with_status(warp::reply::json(data), status).into_response();
    middleware.apply(response)
}

pub fn add_security_headers_to_response(reply: impl Reply, middleware: &SecurityHeadersMiddleware) -> Response {
    middleware.apply(reply.into_response())
}
