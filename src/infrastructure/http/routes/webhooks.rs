//! Gateway webhook route

use warp::Filter;

use crate::infrastructure::http::handlers::handle_webhook;
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::http::utils::with_state;

pub struct WebhookRoutes;

impl WebhookRoutes {
    /// Raw body is kept intact for signature verification
    pub fn create_webhook_route(
        state: AppState,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("webhooks" / "gateway")
            .and(warp::post())
            .and(warp::body::content_length_limit(state.config.webhook.max_body_size as u64))
            .and(warp::body::bytes())
            .and(warp::header::headers_cloned())
            .and(with_state(state))
            .and_then(handle_webhook)
    }
}
