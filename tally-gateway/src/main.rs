//! Tally Gateway Entry Point

use tally_gateway::telemetry::{init_tracing, LogFormat};
use tally_gateway::{create_router, ApiError, ApiResult, GatewayConfig, GatewayState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(LogFormat::from_env())?;

    let config = GatewayConfig::from_env()?;
    let addr = config.bind_addr;
    tracing::info!(%addr, backend = %config.backend_url, "Starting Tally gateway");

    let state = GatewayState::new(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
