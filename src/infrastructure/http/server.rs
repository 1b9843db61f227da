//! HTTP server implementation for reverse proxy deployment
//!
//! TLS, compression and CORS are left to the reverse proxy in front.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, instrument};
use warp::{Filter, Reply};

use crate::config::AppConfig;
use crate::domain::ports::{PaymentGateway, SubmissionStore};
use crate::infrastructure::adapters::{GatewayClient, InMemorySubmissionStore, MonitoringAdapter};
use crate::infrastructure::http::routes::RouteBuilder;
use crate::infrastructure::http::state::AppState;
use crate::shared::error::{AppError, AppResult};

pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Build the gateway client and store from configuration and wire the services
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let monitoring = Arc::new(MonitoringAdapter::new()?);
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(GatewayClient::new(config.gateway.clone())?.with_monitoring(monitoring.clone()));
        let store: Arc<dyn SubmissionStore> =
            Arc::new(InMemorySubmissionStore::connect(config.store.redis_url.as_deref()).await?);
        Ok(Self::with_state(AppState::build(config, gateway, store, monitoring)))
    }

    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone {
        RouteBuilder::build_routes(self.state.clone())
    }

    /// Serve until `shutdown` resolves
    #[instrument(skip(self, shutdown))]
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> AppResult<()> {
        let addr: SocketAddr = self
            .config()
            .server_address()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid server address: {}", e)))?;

        info!(%addr, "Starting HTTP server (reverse proxy mode)");
        let server = warp::serve(self.routes()).run(addr);
        tokio::select! {
            _ = server => {}
            _ = shutdown => info!("Shutdown signal received"),
        }
        info!("HTTP server stopped");
        Ok(())
    }
}
