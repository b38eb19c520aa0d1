//! Tally Core - Session and Resource Types
//!
//! Pure data structures shared by the client, cache and gateway crates.
//! Validity of a token is decided here and nowhere else.

pub mod error;
pub mod identity;
pub mod resource;
pub mod token;
pub mod validation;

pub use error::{TallyError, TallyResult, ValidationError};
pub use identity::{Session, SessionStatus, UserIdentity};
pub use resource::{Record, RecordId, ResourceKind, TenantId};
pub use token::TokenRecord;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
