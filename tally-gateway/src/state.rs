//! Shared application state for Axum routers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use reqwest::{Method, RequestBuilder};

use crate::config::GatewayConfig;
use crate::error::ApiResult;

/// Pooled HTTP client bound to the backend origin.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &GatewayConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.backend_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
        })
    }

    /// Request to `{backend}{path}`, bearer-authenticated when a token is given.
    pub fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.request(method, url);
        match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Backend status and body, passed through unchanged.
pub async fn relay(response: reqwest::Response) -> ApiResult<Response> {
    let status = response.status();
    let content_type: Option<HeaderValue> = response.headers().get(header::CONTENT_TYPE).cloned();
    let body: Bytes = response.bytes().await?;

    let mut relayed = (status, body).into_response();
    relayed.headers_mut().remove(header::CONTENT_TYPE);
    if let Some(content_type) = content_type {
        relayed.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    Ok(relayed)
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub backend: BackendClient,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> ApiResult<Self> {
        let backend = BackendClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            backend,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }
}
