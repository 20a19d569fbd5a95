//! geolens service binary.
//!
//! Wires the configured spatial store and cache into a
//! [`GeoService`](geolens_core::GeoService), serves the HTTP API until
//! `Ctrl-C`, then releases every connection.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`GEOLENS_CONFIG` or `geolens-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the spatial store (`PostGIS` or in-memory seed)
//! 4. Build the cache (`Dragonfly`, in-memory, or disabled)
//! 5. Initialize the service (store ping, cache flush)
//! 6. Serve the HTTP API until `Ctrl-C`
//! 7. Shut the service down

mod backends;
mod error;

use std::sync::Arc;

use geolens_api::AppState;
use geolens_core::config::LoggingConfig;
use geolens_core::{GeoConfig, GeoService};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::GeolensError;

/// Application entry point for the geolens server.
///
/// # Errors
///
/// Returns an error if any initialization step or the server itself fails.
#[tokio::main]
async fn main() -> Result<(), GeolensError> {
    // 1. Load configuration.
    let config = GeoConfig::load()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        store = ?config.store.backend,
        cache = ?config.cache.backend,
        "geolens-server starting"
    );

    // 3-4. Build backends.
    let store = backends::build_store(&config.store).await?;
    let cache = backends::build_cache(&config.cache).await;

    // 5. Initialize the service.
    let service = Arc::new(GeoService::new(store, cache, &config));
    service.init().await?;
    info!("Geo service initialized");

    // 6. Serve until Ctrl-C.
    let state = Arc::new(AppState::new(
        Arc::clone(&service),
        &config.server.allowed_origin,
    ));
    let served = geolens_api::start_server(&config.server, state, shutdown_signal()).await;

    // 7. Release connections whether or not serving succeeded.
    service.shutdown().await;
    served?;
    info!("geolens-server stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) -> Result<(), GeolensError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| GeolensError::Logging {
        message: e.to_string(),
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
    }
}
