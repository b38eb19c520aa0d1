//! HTTP client for the Tally backend.
//!
//! Every request carries `Authorization: Bearer <token>` while the token
//! store holds a valid token and goes out unauthenticated otherwise.
//! Failures are returned as-is; nothing here retries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_cache::CollectionFetcher;
use tally_core::{
    Record, RecordId, ResourceKind, TallyError, TallyResult, TenantId, TokenRecord, UserIdentity,
    ValidationError,
};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::token_store::TokenStore;

const TENANT_HEADER: &str = "x-tenant-id";

/// Keys a list endpoint may wrap its array under.
const LIST_ENVELOPE_KEYS: [&str; 3] = ["data", "items", "results"];

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

/// Login payload. The backend sends either an absolute expiry or a
/// lifetime in seconds.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl LoginResponse {
    pub fn into_token_record(self, now: DateTime<Utc>) -> ClientResult<TokenRecord> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::parse_from_rfc3339(at.trim())
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| ClientError::InvalidResponse(format!("bad expires_at: {e}")))?,
            (None, Some(seconds)) => chrono::Duration::try_seconds(seconds)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .ok_or_else(|| {
                    ClientError::InvalidResponse(format!("expires_in out of range: {seconds}"))
                })?,
            (None, None) => {
                return Err(ClientError::InvalidResponse(
                    "login response has no expiry".to_string(),
                ))
            }
        };
        if self.access_token.is_empty() {
            return Err(ClientError::InvalidResponse(
                "login response has an empty token".to_string(),
            ));
        }
        Ok(TokenRecord::new(self.access_token, expires_at))
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
}

impl GatewayClient {
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> ClientResult<Self> {
        Self::with_base_url(&config.api_base_url, config.request_timeout(), tokens)
    }

    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        tokens: TokenStore,
    ) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// `GET /auth/me` with the current token.
    pub async fn fetch_identity(&self) -> ClientResult<UserIdentity> {
        self.get_json::<UserIdentity, ()>(None, "/auth/me", None)
            .await
    }

    /// `POST /auth/login`. Does not touch the token store.
    pub async fn login(&self, identifier: &str, secret: &str) -> ClientResult<TokenRecord> {
        let body = LoginRequest { identifier, secret };
        let response: LoginResponse = self.post_json(None, "/auth/login", &body).await?;
        response.into_token_record(Utc::now())
    }

    pub async fn list_resources(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
    ) -> ClientResult<Vec<Record>> {
        let path = collection_path(kind);
        let body: Value = self.get_json::<Value, ()>(Some(tenant), &path, None).await?;
        let items = unwrap_list(body)?;
        let records = items
            .into_iter()
            .map(Record::from_value)
            .collect::<TallyResult<Vec<_>>>()?;
        debug!(kind = %kind, tenant = %tenant, count = records.len(), "Listed resources");
        Ok(records)
    }

    pub async fn create_resource(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        body: &Value,
    ) -> ClientResult<Value> {
        self.post_json(Some(tenant), &collection_path(kind), body)
            .await
    }

    pub async fn update_resource(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        id: &RecordId,
        body: &Value,
    ) -> ClientResult<Value> {
        let url = self.record_url(kind, id)?;
        self.put_json_at(Some(tenant), url, body).await
    }

    pub async fn delete_resource(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        id: &RecordId,
    ) -> ClientResult<()> {
        let url = self.record_url(kind, id)?;
        self.delete_at(Some(tenant), url).await
    }

    pub async fn get_json<T, Q>(
        &self,
        tenant: Option<&TenantId>,
        path: &str,
        query: Option<&Q>,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let mut request = self.request(Method::GET, tenant, path)?;
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    pub async fn post_json<T, B>(
        &self,
        tenant: Option<&TenantId>,
        path: &str,
        body: &B,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .request(Method::POST, tenant, path)?
            .json(body)
            .send()
            .await?;
        self.parse_response(response).await
    }

    pub async fn put_json<T, B>(
        &self,
        tenant: Option<&TenantId>,
        path: &str,
        body: &B,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.put_json_at(tenant, self.url_for(path)?, body).await
    }

    pub async fn delete(&self, tenant: Option<&TenantId>, path: &str) -> ClientResult<()> {
        self.delete_at(tenant, self.url_for(path)?).await
    }

    async fn put_json_at<T, B>(
        &self,
        tenant: Option<&TenantId>,
        url: Url,
        body: &B,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .request_url(Method::PUT, tenant, url)?
            .json(body)
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn delete_at(&self, tenant: Option<&TenantId>, url: Url) -> ClientResult<()> {
        let response = self.request_url(Method::DELETE, tenant, url)?.send().await?;
        Self::read_success_body(response).await.map(|_| ())
    }

    fn url_for(&self, path: &str) -> ClientResult<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ClientError::Config(format!("invalid request URL: {e}")))
    }

    /// `{base}/api/v1/{segment}/{id}` with the id as one encoded path segment.
    fn record_url(&self, kind: ResourceKind, id: &RecordId) -> ClientResult<Url> {
        let id = id.as_str();
        if id.is_empty() || id == "." || id == ".." {
            return Err(TallyError::from(ValidationError::InvalidValue {
                field: "id".to_string(),
                reason: format!("'{id}' is not a usable record id"),
            })
            .into());
        }
        let mut url = self.url_for(&collection_path(kind))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("base URL cannot carry a path".to_string()))?
            .push(id);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        tenant: Option<&TenantId>,
        path: &str,
    ) -> ClientResult<RequestBuilder> {
        self.request_url(method, tenant, self.url_for(path)?)
    }

    fn request_url(
        &self,
        method: Method,
        tenant: Option<&TenantId>,
        url: Url,
    ) -> ClientResult<RequestBuilder> {
        debug!(method = %method, url = %url, "Sending request");
        Ok(self
            .client
            .request(method, url)
            .headers(self.build_headers(tenant)?))
    }

    fn build_headers(&self, tenant: Option<&TenantId>) -> ClientResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.tokens.bearer() {
            let value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| ClientError::Config(e.to_string()))?,
            );
        }
        if let Some(tenant) = tenant {
            headers.insert(
                HeaderName::from_static(TENANT_HEADER),
                HeaderValue::from_str(tenant.as_str())
                    .map_err(|e| ClientError::Config(e.to_string()))?,
            );
        }
        Ok(headers)
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let text = Self::read_success_body(response).await?;
        let body = if text.trim().is_empty() {
            "null"
        } else {
            text.as_str()
        };
        Ok(serde_json::from_str(body)?)
    }

    async fn read_success_body(response: reqwest::Response) -> ClientResult<String> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else if status == StatusCode::UNAUTHORIZED {
            Err(ClientError::Unauthorized { body: text })
        } else {
            Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

#[async_trait]
impl CollectionFetcher for GatewayClient {
    async fn fetch_collection(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
    ) -> TallyResult<Vec<Record>> {
        self.list_resources(kind, tenant)
            .await
            .map_err(TallyError::from)
    }
}

fn collection_path(kind: ResourceKind) -> String {
    format!("/api/v1/{}", kind.collection_segment())
}

/// Accept a bare array or an object wrapping one.
fn unwrap_list(body: Value) -> ClientResult<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => LIST_ENVELOPE_KEYS
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                ClientError::InvalidResponse("list response has no array".to_string())
            }),
        other => Err(ClientError::InvalidResponse(format!(
            "expected a list, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_list_variants() {
        assert_eq!(unwrap_list(json!([{"id": 1}])).unwrap().len(), 1);
        assert_eq!(unwrap_list(json!({"data": [{"id": 1}, {"id": 2}]})).unwrap().len(), 2);
        assert_eq!(unwrap_list(json!({"results": []})).unwrap().len(), 0);
        assert!(unwrap_list(json!({"data": {"id": 1}})).is_err());
        assert!(unwrap_list(json!("nope")).is_err());
    }

    #[test]
    fn test_login_response_with_expires_in() {
        let now = Utc::now();
        let response: LoginResponse =
            serde_json::from_value(json!({"access_token": "t", "expires_in": 3600})).unwrap();
        let record = response.into_token_record(now).unwrap();
        assert_eq!(record.expires_at, now + chrono::Duration::seconds(3600));
    }

    #[test]
    fn test_login_response_with_huge_expires_in_is_rejected() {
        for seconds in [9_000_000_000_000_000_i64, i64::MAX, i64::MIN] {
            let response: LoginResponse =
                serde_json::from_value(json!({"access_token": "t", "expires_in": seconds}))
                    .unwrap();
            assert!(matches!(
                response.into_token_record(Utc::now()),
                Err(ClientError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn test_login_response_with_expires_at() {
        let response: LoginResponse = serde_json::from_value(
            json!({"token": "t", "expires_at": "2030-01-01T00:00:00.000Z"}),
        )
        .unwrap();
        let record = response.into_token_record(Utc::now()).unwrap();
        assert_eq!(record.access_token, "t");
        assert_eq!(record.expires_at_iso(), "2030-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_login_response_without_expiry_is_rejected() {
        let response: LoginResponse =
            serde_json::from_value(json!({"access_token": "t"})).unwrap();
        assert!(matches!(
            response.into_token_record(Utc::now()),
            Err(ClientError::InvalidResponse(_))
        ));
    }

    fn offline_client() -> GatewayClient {
        GatewayClient::with_base_url(
            "http://127.0.0.1:9/backend/",
            Duration::from_millis(200),
            TokenStore::in_memory(),
        )
        .unwrap()
    }

    #[test]
    fn test_paths() {
        assert_eq!(collection_path(ResourceKind::Invoice), "/api/v1/invoices");
        let client = offline_client();
        assert_eq!(
            client
                .record_url(ResourceKind::Client, &RecordId::new("c-1"))
                .unwrap()
                .as_str(),
            "http://127.0.0.1:9/backend/api/v1/clients/c-1"
        );
    }

    #[test]
    fn test_record_id_is_a_single_encoded_segment() {
        let client = offline_client();
        let url = client
            .record_url(ResourceKind::Item, &RecordId::new("a/b?c#d"))
            .unwrap();
        assert_eq!(url.path(), "/backend/api/v1/items/a%2Fb%3Fc%23d");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());

        for id in ["..", ".", ""] {
            assert!(matches!(
                client.record_url(ResourceKind::Item, &RecordId::new(id)),
                Err(ClientError::Tally(TallyError::Validation(_)))
            ));
        }
    }
}
