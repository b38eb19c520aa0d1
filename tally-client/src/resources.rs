//! Resource reads through the cache and mutations that keep it honest.
//!
//! Every mutation invalidates the `(kind, tenant)` scope once the backend
//! call has finished, whether it succeeded or not, since a failed request
//! may still have been applied server-side.

use serde_json::Value;
use tally_cache::{CacheResult, CollectionRead, ResourceCache};
use tally_core::{Record, RecordId, ResourceKind, TallyError, TenantId, ValidationError};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::gateway_client::GatewayClient;

#[derive(Clone)]
pub struct Resources {
    client: GatewayClient,
    cache: ResourceCache<GatewayClient>,
}

impl Resources {
    pub fn new(client: GatewayClient, cache: ResourceCache<GatewayClient>) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &ResourceCache<GatewayClient> {
        &self.cache
    }

    pub fn prefetch(&self, kind: ResourceKind, tenant: &TenantId) {
        self.cache.prefetch(kind, tenant);
    }

    pub fn get_collection(&self, kind: ResourceKind, tenant: &TenantId) -> CollectionRead {
        self.cache.get_collection(kind, tenant)
    }

    pub async fn load_collection(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
    ) -> CacheResult<CollectionRead> {
        self.cache.load_collection(kind, tenant).await
    }

    pub async fn get_one(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        id: &RecordId,
    ) -> CacheResult<Option<Record>> {
        self.cache.get_one(kind, tenant, id).await
    }

    pub async fn create(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        body: &Value,
    ) -> ClientResult<Value> {
        require_object(body)?;
        let result = self.client.create_resource(kind, tenant, body).await;
        self.after_mutation(kind, tenant);
        result
    }

    pub async fn update(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        id: &RecordId,
        body: &Value,
    ) -> ClientResult<Value> {
        require_object(body)?;
        let result = self.client.update_resource(kind, tenant, id, body).await;
        self.after_mutation(kind, tenant);
        result
    }

    pub async fn delete(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        id: &RecordId,
    ) -> ClientResult<()> {
        let result = self.client.delete_resource(kind, tenant, id).await;
        self.after_mutation(kind, tenant);
        result
    }

    fn after_mutation(&self, kind: ResourceKind, tenant: &TenantId) {
        debug!(kind = %kind, tenant = %tenant, "Invalidating after mutation");
        self.cache.invalidate(kind, tenant);
    }
}

fn require_object(body: &Value) -> ClientResult<()> {
    if body.is_object() {
        Ok(())
    } else {
        Err(ClientError::Tally(TallyError::Validation(
            ValidationError::InvalidValue {
                field: "body".to_string(),
                reason: "must be a JSON object".to_string(),
            },
        )))
    }
}
