//! Health Check Endpoints
//!
//! No authentication required.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};

use crate::state::GatewayState;

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// Create health check router
pub fn create_router() -> Router<GatewayState> {
    Router::new().route("/ping", get(ping))
}
