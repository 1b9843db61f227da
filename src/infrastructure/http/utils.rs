//! HTTP utilities - filters shared by the route groups

use std::convert::Infallible;

use warp::Filter;

use crate::infrastructure::http::handlers::payments::RequestHeaders;
use crate::infrastructure::http::state::AppState;

/// Inject the application state into a route
pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Credential and client-identity headers, all optional
pub fn request_headers() -> impl Filter<Extract = (RequestHeaders,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("x-access-token")
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::header::optional::<String>("referer"))
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .map(
            |access_token: Option<String>,
             authorization: Option<String>,
             referer: Option<String>,
             forwarded_for: Option<String>| RequestHeaders {
                access_token,
                authorization,
                referer,
                forwarded_for,
            },
        )
}
