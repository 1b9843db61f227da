use anyhow::Context;
use payment_reconciler::shared::LoggingUtils;
use payment_reconciler::{AppConfig, HttpServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    LoggingUtils::initialize(&config.logging.level, &config.logging.format)
        .context("failed to initialize logging")?;
    info!("Configuration loaded successfully");

    let server = HttpServer::new(config).await.context("failed to initialize server")?;
    let (cleanup_shutdown, cleanup_task) = server.state().cleanup_worker().spawn();

    info!("Server starting on {}", server.config().server_address());
    let result = server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    let _ = cleanup_shutdown.send(true);
    if let Err(e) = cleanup_task.await {
        error!("Cleanup worker ended abnormally: {}", e);
    }
    result.context("server error")
}
