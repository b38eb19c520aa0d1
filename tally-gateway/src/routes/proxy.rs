//! Generic authenticated forwarding.
//!
//! `POST /proxy` takes `{path, method, body?, params?}`, forwards it to the
//! backend with the session cookie as the bearer credential and relays the
//! backend's status and body unchanged.

use axum::{extract::State, http::HeaderMap, response::Response, Json};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cookie::extract_session_token;
use crate::error::{ApiError, ApiResult};
use crate::state::{relay, GatewayState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

impl ProxyRequest {
    /// Only same-origin absolute paths are forwarded.
    pub fn validate_path(&self) -> ApiResult<()> {
        if !self.path.starts_with('/') {
            return Err(ApiError::invalid_input("path must start with '/'"));
        }
        if self.path.contains("://") {
            return Err(ApiError::invalid_input("path must not contain a scheme"));
        }
        Ok(())
    }

    pub fn parse_method(&self) -> ApiResult<Method> {
        match self.method.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            other => Err(ApiError::invalid_input(format!(
                "Unsupported method: {}",
                other
            ))),
        }
    }

    /// `params` flattened to query pairs. Arrays repeat the key; nulls are
    /// dropped.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let Some(params) = &self.params else {
            return pairs;
        };
        for (key, value) in params {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = query_value(item) {
                            pairs.push((key.clone(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = query_value(other) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
        }
        pairs
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// POST /proxy
pub async fn proxy(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(request): Json<ProxyRequest>,
) -> ApiResult<Response> {
    let token =
        extract_session_token(&headers, state.cookie_name()).ok_or_else(ApiError::unauthorized)?;
    request.validate_path()?;
    let method = request.parse_method()?;

    debug!(method = %method, path = %request.path, "Proxying request");
    let mut outbound = state
        .backend
        .request(method, &request.path, Some(&token));
    let query = request.query_pairs();
    if !query.is_empty() {
        outbound = outbound.query(&query);
    }
    if let Some(body) = &request.body {
        outbound = outbound.json(body);
    }
    let response = outbound.send().await?;
    relay(response).await
}
