//! REST route handlers.

pub mod auth;
pub mod health;
pub mod proxy;

use axum::{routing::post, Router};
use tower_http::trace::TraceLayer;

use crate::state::GatewayState;

/// Assemble every route behind request tracing.
pub fn create_router(state: GatewayState) -> Router {
    Router::new()
        .nest("/auth", auth::create_router())
        .nest("/health", health::create_router())
        .route("/proxy", post(proxy::proxy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
