//! Payments routes

use warp::Filter;

use crate::infrastructure::http::handlers::{
    handle_capture_order, handle_create_order, handle_create_submission, handle_get_submission, handle_recover,
};
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::http::utils::{request_headers, with_state};

pub struct PaymentsRoutes;

impl PaymentsRoutes {
    pub fn create_routes(state: AppState) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let limit = state.config.server.max_request_size as u64;

        let submit = warp::path!("payments" / "submissions")
            .and(warp::post())
            .and(warp::body::content_length_limit(limit))
            .and(warp::body::json())
            .and(request_headers())
            .and(with_state(state.clone()))
            .and_then(handle_create_submission);

        let order = warp::path!("payments" / String / "order")
            .and(warp::post())
            .and(request_headers())
            .and(with_state(state.clone()))
            .and_then(handle_create_order);

        let capture = warp::path!("payments" / String / "capture")
            .and(warp::post())
            .and(warp::body::content_length_limit(limit))
            .and(warp::body::json())
            .and(request_headers())
            .and(with_state(state.clone()))
            .and_then(handle_capture_order);

        let recover = warp::path!("payments" / String / "recover")
            .and(warp::post())
            .and(request_headers())
            .and(with_state(state.clone()))
            .and_then(handle_recover);

        let status = warp::path!("payments" / String)
            .and(warp::get())
            .and(request_headers())
            .and(with_state(state))
            .and_then(handle_get_submission);

        submit.or(order).or(capture).or(recover).or(status)
    }
}
