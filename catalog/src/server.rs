//! Server lifecycle management
//!
//! Starts the collection-side daemon: the HTTP read API, the wall-clock scheduler
//! (§4.M), and the single-runner task dispatcher (§4.E), then waits for a shutdown
//! signal and drains cleanly.

use std::sync::Arc;

use catalog_core::bootstrap::services::Services;
use catalog_core::Config;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dispatcher;

pub struct CatalogServer {
    config: Config,
    services: Arc<Services>,
    pool: PgPool,
    http_handle: Option<JoinHandle<()>>,
    scheduler_handle: Option<JoinHandle<()>>,
    dispatcher_handle: Option<JoinHandle<()>>,
}

impl CatalogServer {
    #[must_use]
    pub const fn new(config: Config, services: Arc<Services>, pool: PgPool) -> Self {
        Self {
            config,
            services,
            pool,
            http_handle: None,
            scheduler_handle: None,
            dispatcher_handle: None,
        }
    }

    /// Start the HTTP server, scheduler, and task dispatcher, then block until a
    /// shutdown signal arrives.
    pub async fn start(mut self) -> anyhow::Result<()> {
        info!("Starting catalog server...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.http_handle = Some(self.start_http_server(shutdown_rx.clone())?);

        if self.config.scheduler.enabled {
            let scheduler = self.services.scheduler.clone();
            self.scheduler_handle = Some(tokio::spawn(async move {
                scheduler.run().await;
            }));
            info!("Scheduler started (tick every {}s)", self.config.scheduler.tick_interval_seconds);
        } else {
            info!("Scheduler disabled by configuration");
        }

        let dispatch_services = self.services.clone();
        self.dispatcher_handle = Some(tokio::spawn(async move {
            dispatcher::run(dispatch_services).await;
        }));
        info!("Task dispatcher started");

        info!("Catalog server started successfully");

        let http_handle = self.http_handle.take().ok_or_else(|| anyhow::anyhow!("HTTP server handle missing after startup"))?;

        tokio::select! {
            _ = http_handle => {
                error!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        let _ = shutdown_tx.send(true);
        self.shutdown().await;

        Ok(())
    }

    async fn shutdown(&mut self) {
        info!("Shutting down catalog server...");

        if let Some(handle) = self.scheduler_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.dispatcher_handle.take() {
            handle.abort();
        }

        info!("Closing database connection pool...");
        self.pool.close().await;
        info!("Catalog server shut down complete");
    }

    fn start_http_server(&self, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<JoinHandle<()>> {
        let state = catalog_api::AppState::new(Arc::new(self.config.clone()), (*self.services).clone());
        let router = catalog_api::http::create_router(state);
        let http_address = self.config.http_address();

        let handle = tokio::spawn(async move {
            let http_addr: std::net::SocketAddr = match http_address.parse() {
                Ok(addr) => addr,
                Err(e) => {
                    error!("Invalid HTTP address '{}': {}", http_address, e);
                    return;
                }
            };

            let listener = match tokio::net::TcpListener::bind(http_addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to bind HTTP address {}: {}", http_addr, e);
                    return;
                }
            };

            info!("HTTP server listening on {}", http_addr);

            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(graceful).await {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
