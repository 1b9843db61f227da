//! Health and metrics routes

use warp::Filter;

use crate::infrastructure::http::handlers::{handle_health_request, handle_prometheus_request};
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::http::utils::with_state;

pub struct HealthRoutes;

impl HealthRoutes {
    pub fn create_health_route(
        state: AppState,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("health")
            .and(warp::get())
            .and(with_state(state))
            .and_then(handle_health_request)
    }

    pub fn create_prometheus_route(
        state: AppState,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("metrics")
            .and(warp::get())
            .and(with_state(state))
            .and_then(handle_prometheus_request)
    }
}
