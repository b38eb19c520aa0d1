//! Access token record.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Timestamp;

/// An opaque access token together with its expiry.
///
/// The token string is never inspected. Validity depends only on
/// `expires_at` compared with the wall clock at check time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub expires_at: Timestamp,
}

impl TokenRecord {
    pub fn new(access_token: impl Into<String>, expires_at: Timestamp) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// True iff the record has a token and `expires_at` is strictly after `now`.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        !self.access_token.is_empty() && self.expires_at > now
    }

    /// [`TokenRecord::is_valid_at`] against the current wall clock.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Expiry in the ISO-8601 form used by persistence.
    pub fn expires_at_iso(&self) -> String {
        self.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Rebuild a record from its two persisted string fields.
    ///
    /// Returns `None` when either field is missing or the expiry does not
    /// parse, so a half-written record reads the same as no record.
    pub fn from_parts(access_token: Option<String>, expires_at: Option<String>) -> Option<Self> {
        let access_token = access_token.filter(|t| !t.is_empty())?;
        let expires_at = DateTime::parse_from_rfc3339(expires_at?.trim())
            .ok()?
            .with_timezone(&Utc);
        Some(Self {
            access_token,
            expires_at,
        })
    }
}

// Keeps tokens out of logs and panic messages.
impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
