// Catalog read API server
//
// Serves the HTTP read path (catalog browsing, search, recommendations, task
// administration) over the services `catalog_core::bootstrap` wires up.

use std::sync::Arc;

use anyhow::Result;
use catalog_core::bootstrap::{init_database, init_services, load_config};
use catalog_core::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    logging::init_logging(&config.logging)?;

    info!("Catalog API server starting...");

    let pool = init_database(&config).await?;
    let services = init_services(pool, &config).await?;

    let state = catalog_api::AppState::new(Arc::new(config.clone()), services);
    let router = catalog_api::http::create_router(state);

    let http_address = config.http_address();
    let http_addr: std::net::SocketAddr = http_address.parse().expect("invalid HTTP address");

    let listener = tokio::net::TcpListener::bind(http_addr).await.map_err(|e| {
        error!("Failed to bind HTTP address {}: {}", http_addr, e);
        anyhow::anyhow!("failed to bind {http_addr}: {e}")
    })?;

    info!("HTTP server listening on {}", http_addr);

    axum::serve(listener, router).await.map_err(|e| {
        error!("HTTP server error: {}", e);
        anyhow::anyhow!("HTTP server error: {e}")
    })?;

    Ok(())
}
