//! Emergency shelter lookup HTTP service.
//!
//! # Configuration
//!
//! - `SHELTERFINDER_DATA_DIR` - Directory holding the shelter CSV (default: `.`)
//! - `SERVICE_HOST` - Bind address (default: `0.0.0.0`)
//! - `SERVICE_PORT` or `PORT` - HTTP port (default: 8000)
//! - `SHELTERFINDER_PRELOAD` - Load the dataset before serving (default: false)
//! - `GOOGLE_MAPS_API_KEY` or `GOOGLE_API_KEY` - Enables `/nearest/by-zip`
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text
//! - `METRICS_ENABLED`, `METRICS_PATH` - Prometheus endpoint settings

use std::net::SocketAddr;

use tracing::{error, info};

use shelterfinder_service::{build_router, SERVICE_NAME};
use shelterfinder_service_shared::{
    init_logging, init_metrics, AppState, LoggingConfig, MetricsConfig, ServiceConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service(SERVICE_NAME);
    init_logging(&logging_config);

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        tracing::warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config = ServiceConfig::from_env();
    info!(
        data_dir = %config.data_dir.display(),
        addr = %config.bind_addr(),
        zip_supported = config.zip_supported(),
        "starting shelter service"
    );

    // The blocking geocoding client must be built outside the async runtime.
    let state = AppState::from_config(&config).map_err(|e| {
        error!(error = %e, "failed to build application state");
        e
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    // Keep a handle so the last reference to the geocoding client drops
    // outside the runtime.
    let result = runtime.block_on(serve(state.clone(), &config, &metrics_config));
    drop(runtime);
    drop(state);
    result
}

async fn serve(
    state: AppState,
    config: &ServiceConfig,
    metrics_config: &MetricsConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state, metrics_config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "listening on");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
