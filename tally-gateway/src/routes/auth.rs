//! Session Endpoints
//!
//! - POST /auth/login - exchange credentials for an HttpOnly session cookie
//! - GET /auth/identity - identity of the cookie's session
//! - POST /auth/logout - clear the cookie
//!
//! The access token only ever travels in the cookie; it is stripped from
//! the login response body.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tally_core::validation::validate_required;
use tracing::{debug, warn};

use crate::cookie::{clear_cookie, extract_session_token, session_cookie};
use crate::error::{ApiError, ApiResult};
use crate::state::{relay, GatewayState};

/// Where the backend may put the access token.
const TOKEN_KEYS: [&str; 2] = ["access_token", "token"];

/// Fields removed from the login body before it reaches the browser.
const TOKEN_FIELDS: [&str; 3] = ["access_token", "token", "refresh_token"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub secret: String,
}

/// POST /auth/login
pub async fn login(
    State(state): State<GatewayState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Response> {
    validate_required("identifier", &request.identifier)?;
    validate_required("secret", &request.secret)?;

    let response = state
        .backend
        .request(Method::POST, "/auth/login", None)
        .json(&request)
        .send()
        .await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        debug!(status = status.as_u16(), "Backend rejected login");
        return Ok((status, Json(json!({ "error": error_message(&text, status) }))).into_response());
    }

    let mut body: Map<String, Value> = serde_json::from_str(&text).map_err(|e| {
        warn!(error = %e, "Backend login response is not a JSON object");
        ApiError::backend_unavailable("Backend returned an invalid login response")
    })?;
    let token = TOKEN_KEYS
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::backend_unavailable("Backend login response has no token"))?;
    let max_age = cookie_max_age(&body, Utc::now());
    for field in TOKEN_FIELDS {
        body.remove(field);
    }

    let cookie = session_cookie(
        state.cookie_name(),
        &token,
        max_age,
        state.config.cookie_secure,
    );
    debug!(max_age = ?max_age, "Login succeeded; session cookie set");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(Value::Object(body)),
    )
        .into_response())
}

/// GET /auth/identity
pub async fn identity(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let token =
        extract_session_token(&headers, state.cookie_name()).ok_or_else(ApiError::unauthorized)?;

    let response = state
        .backend
        .request(Method::GET, "/auth/me", Some(&token))
        .send()
        .await?;
    if response.status() == StatusCode::UNAUTHORIZED {
        debug!("Backend rejected session cookie");
        return Err(ApiError::unauthorized());
    }
    relay(response).await
}

/// POST /auth/logout
///
/// Local only: the backend is not asked to revoke anything.
pub async fn logout(State(state): State<GatewayState>) -> impl IntoResponse {
    let cookie = clear_cookie(state.cookie_name(), state.config.cookie_secure);
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}

/// Cookie lifetime from `expires_in` (seconds) or `expires_at` (RFC 3339).
fn cookie_max_age(body: &Map<String, Value>, now: DateTime<Utc>) -> Option<i64> {
    if let Some(seconds) = body.get("expires_in").and_then(Value::as_i64) {
        return Some(seconds.max(0));
    }
    let expires_at = body.get("expires_at").and_then(Value::as_str)?;
    let expires_at = DateTime::parse_from_rfc3339(expires_at.trim()).ok()?;
    Some((expires_at.with_timezone(&Utc) - now).num_seconds().max(0))
}

/// The backend's own error message if it sent one.
fn error_message(text: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| {
            ["error", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .or_else(|| {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Login failed")
                .to_string()
        })
}

/// Create the session router.
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/login", post(login))
        .route("/identity", get(identity))
        .route("/logout", post(logout))
}
