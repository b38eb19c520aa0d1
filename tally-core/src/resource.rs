//! Resource kinds, tenant scoping and cached records.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::TallyError;

/// Backend collections the front-end caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Client,
    Invoice,
    Item,
    Project,
    Transaction,
    Notification,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Client,
        ResourceKind::Invoice,
        ResourceKind::Item,
        ResourceKind::Project,
        ResourceKind::Transaction,
        ResourceKind::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Client => "client",
            ResourceKind::Invoice => "invoice",
            ResourceKind::Item => "item",
            ResourceKind::Project => "project",
            ResourceKind::Transaction => "transaction",
            ResourceKind::Notification => "notification",
        }
    }

    /// Path segment of the collection endpoint.
    pub fn collection_segment(&self) -> &'static str {
        match self {
            ResourceKind::Client => "clients",
            ResourceKind::Invoice => "invoices",
            ResourceKind::Item => "items",
            ResourceKind::Project => "projects",
            ResourceKind::Transaction => "transactions",
            ResourceKind::Notification => "notifications",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle || kind.collection_segment() == needle)
            .ok_or_else(|| TallyError::UnknownResourceKind { kind: s.to_string() })
    }
}

/// Tenant (business) scope of a cached collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a single record inside a collection.
///
/// Backends send ids as strings or integers; both normalize to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A backend record: a JSON object with an id.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    body: Value,
}

impl Record {
    /// Build a record from a backend JSON object.
    ///
    /// The id is read from `id`, then `_id`.
    pub fn from_value(body: Value) -> Result<Self, TallyError> {
        let object = body.as_object().ok_or_else(|| TallyError::InvalidResponse {
            reason: "record is not a JSON object".to_string(),
        })?;
        let id = ["id", "_id"]
            .iter()
            .find_map(|key| object.get(*key).and_then(RecordId::from_json))
            .ok_or_else(|| TallyError::InvalidResponse {
                reason: "record has no id".to_string(),
            })?;
        Ok(Self { id, body })
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

impl TryFrom<Value> for Record {
    type Error = TallyError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}
