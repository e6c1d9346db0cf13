use std::sync::Arc;

use clap::Parser;
use pvs_bus::RedisBus;
use pvs_frontend::{router, AppState, FrontendConfig};
use pvs_store::PostgresStore;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    let _guard = env_tracing_logger::init();

    let config = FrontendConfig::parse();
    info!("starting pvs-frontend");

    let store = Arc::new(PostgresStore::connect(&config.database_url).await?);
    let bus = Arc::new(RedisBus::connect(&config.redis_url).await?);

    let state = AppState::new(
        store,
        bus,
        config.broadcaster_queue_depth,
        config.default_event_page_size,
        std::time::Duration::from_secs(config.latest_frame_ttl_secs),
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "pvs-frontend listening");
    axum::serve(listener, app).await?;

    Ok(())
}
