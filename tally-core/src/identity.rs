//! Signed-in user identity and the process-wide session value.

use serde::{Deserialize, Serialize};

use crate::TenantId;

/// Identity payload returned by the backend for the current token.
///
/// Unknown fields sent by the backend are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tenants: Vec<TenantId>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserIdentity {
    pub fn has_tenant(&self, tenant: &TenantId) -> bool {
        self.tenants.iter().any(|t| t == tenant)
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// A refresh is outstanding.
    Loading,
    /// Settled with an identity.
    Authenticated,
    /// Settled without an identity.
    Anonymous,
}

/// The single authentication state of a running application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Option<UserIdentity>,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Session {
    /// Initial state at application start.
    pub fn loading() -> Self {
        Self {
            identity: None,
            status: SessionStatus::Loading,
            last_error: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            identity: None,
            status: SessionStatus::Anonymous,
            last_error: None,
        }
    }

    pub fn anonymous_with_error(reason: impl Into<String>) -> Self {
        Self {
            identity: None,
            status: SessionStatus::Anonymous,
            last_error: Some(reason.into()),
        }
    }

    pub fn authenticated(identity: UserIdentity) -> Self {
        Self {
            identity: Some(identity),
            status: SessionStatus::Authenticated,
            last_error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated && self.identity.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::loading()
    }
}
