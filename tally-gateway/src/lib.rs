//! Tally Gateway
//!
//! Edge gateway for cookie-mode deployments. The browser never sees the
//! access token: login stores it in an HttpOnly cookie, and every later
//! call is forwarded to the backend with that cookie as the bearer
//! credential.

pub mod config;
pub mod cookie;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, GatewayConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;
pub use state::{BackendClient, GatewayState};
