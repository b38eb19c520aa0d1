//! Error types for Tally operations

use thiserror::Error;

/// Local, per-field validation failures. These never reach the network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type shared across crates.
///
/// `Clone` so a single fetch outcome can be handed to every waiter of a
/// shared request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Unknown resource kind: {kind}")]
    UnknownResourceKind { kind: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl TallyError {
    /// True for failures the caller may retry (transport and 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            TallyError::Transport { .. } => true,
            TallyError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TallyError::Unauthorized { .. })
    }
}

/// Result type alias for Tally operations.
pub type TallyResult<T> = Result<T, TallyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = TallyError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("503"));
        assert!(msg.contains("maintenance"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_unauthorized_is_not_transient() {
        let err = TallyError::Unauthorized {
            reason: "expired".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_validation_converts() {
        let err = TallyError::from(ValidationError::RequiredFieldMissing {
            field: "email".to_string(),
        });
        assert!(matches!(err, TallyError::Validation(_)));
        assert!(format!("{}", err).contains("email"));
    }
}
