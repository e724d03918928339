//! Model Hub Server - HTTP API for the local inference gateway

use std::sync::Arc;

use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod state;

use modelhub_core::{DisabledBackendFactory, GatewayConfig, GatewayEngine, ServerConfig};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "modelhub_server=debug,modelhub_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Model Hub Server");

    let config = GatewayConfig::default();
    info!("Models directory: {:?}", config.models_dir);
    info!("Registry: {:?}", config.registry_path);

    // No model runtime is linked into this binary yet; the gateway
    // reports capability unavailability per request instead of
    // refusing to start.
    let engine = GatewayEngine::new(config, Arc::new(DisabledBackendFactory), None).await;
    let state = AppState::new(engine);

    info!("Gateway engine initialized");

    let server_config = ServerConfig::default();
    let app = api::create_router(state.clone(), &server_config);

    let addr = server_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    let shutdown_state = state.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_state));

    info!("Server ready. Press Ctrl+C to stop.");
    server.await?;

    Ok(())
}

/// Wait for shutdown signal and cleanup
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
    drop(state);
}
