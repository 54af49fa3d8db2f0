// Catalog collection server
//
// Collects, classifies, and serves the video catalog: runs database migrations,
// wires up the catalog-core services, then starts the HTTP read API alongside the
// wall-clock scheduler (§4.M) and task dispatcher (§4.E) as background loops.

mod dispatcher;
mod migrations;
mod server;

use std::sync::Arc;

use anyhow::Result;
use catalog_core::bootstrap::{init_database, init_services, load_config};
use catalog_core::logging;
use tracing::info;

use server::CatalogServer;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    logging::init_logging(&config.logging)?;

    info!("Catalog server starting...");

    let pool = init_database(&config).await?;

    migrations::run_migrations(&pool, &config.redis.url).await?;

    let services = init_services(pool.clone(), &config).await?;

    let server = CatalogServer::new(config, Arc::new(services), pool);
    server.start().await?;

    info!("Catalog server exited");
    Ok(())
}
