//! lobbyd — ephemeral voice-room controller daemon.

use lobbyd::config::Config;
use lobbyd::controller::SessionController;
use lobbyd::db::Database;
use lobbyd::dispatch::Dispatcher;
use lobbyd::remote::{HttpRoomGateway, Retry, RoomGateway};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(port = config.server.port, "Starting lobbyd");

    let db = Database::new(&config.database.path).await?;

    lobbyd::metrics::init();
    info!("Metrics initialized");

    let gateway: Arc<dyn RoomGateway> = Arc::new(Retry::new(
        HttpRoomGateway::new(&config.remote)
            .map_err(|e| anyhow::anyhow!("failed to construct room gateway: {e}"))?,
        config.remote.request_timeout(),
        config.remote.retry_backoff(),
    ));

    let controller = Arc::new(SessionController::new(db.clone(), gateway));
    let dispatcher = Dispatcher::new(controller);

    if config.reconciler.enabled {
        lobbyd::reconciler::spawn_periodic(
            db.clone(),
            Arc::clone(&dispatcher),
            config.reconciler.interval(),
        );
        info!(
            interval_secs = config.reconciler.interval_secs,
            "Reconciler task started"
        );
    } else {
        info!("Periodic reconciler disabled; `cleanup` remains available");
    }

    lobbyd::http::serve(config.server.port, dispatcher).await?;

    Ok(())
}
