//! Tenant-scoped cache keys.
//!
//! A [`ScopeKey`] cannot be built without a tenant, and a [`RecordKey`]
//! cannot be built without a [`ScopeKey`], so every cache lookup is
//! tenant-isolated by construction.

use std::fmt;

use tally_core::{RecordId, ResourceKind, TenantId};

/// Separator used in the textual key form.
const SEPARATOR: char = ':';

/// Collection-level key: `(kind, tenant)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    kind: ResourceKind,
    tenant: TenantId,
}

impl ScopeKey {
    pub fn new(kind: ResourceKind, tenant: TenantId) -> Self {
        Self { kind, tenant }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Per-id key for a record inside this scope.
    pub fn record(&self, record_id: RecordId) -> RecordKey {
        RecordKey {
            scope: self.clone(),
            record_id,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, SEPARATOR, self.tenant)
    }
}

/// Record-level key: `(kind, tenant, record_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    scope: ScopeKey,
    record_id: RecordId,
}

impl RecordKey {
    pub fn new(kind: ResourceKind, tenant: TenantId, record_id: RecordId) -> Self {
        ScopeKey::new(kind, tenant).record(record_id)
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scope, SEPARATOR, self.record_id)
    }
}
