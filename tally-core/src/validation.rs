//! Field validators.
//!
//! Pure functions: input in, `Ok(())` or a [`ValidationError`] out. Forms
//! run these before anything is handed to the HTTP layer.

use crate::error::ValidationError;

pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Shape check only: one `@`, non-empty local part, dotted domain.
pub fn validate_email(field: &str, value: &str) -> Result<(), ValidationError> {
    validate_required(field, value)?;
    let value = value.trim();
    let invalid = |reason: &str| ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    };
    let (local, domain) = value.split_once('@').ok_or_else(|| invalid("missing '@'"))?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid("malformed address"));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("malformed domain"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }
    Ok(())
}

/// Monetary amounts: finite, non-negative, at most two decimals.
pub fn validate_amount(field: &str, value: f64) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    };
    if !value.is_finite() {
        return Err(invalid("must be a finite number"));
    }
    if value < 0.0 {
        return Err(invalid("must be >= 0"));
    }
    let cents = value * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        return Err(invalid("at most two decimal places"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_blank() {
        assert!(validate_required("name", "  ").is_err());
        assert!(validate_required("name", "Acme").is_ok());
    }

    #[test]
    fn test_email_shapes() {
        assert!(validate_email("email", "owner@example.com").is_ok());
        assert!(validate_email("email", "owner.example.com").is_err());
        assert!(validate_email("email", "@example.com").is_err());
        assert!(validate_email("email", "owner@example").is_err());
        assert!(validate_email("email", "a@b@example.com").is_err());
    }

    #[test]
    fn test_amounts() {
        assert!(validate_amount("total", 12.5).is_ok());
        assert!(validate_amount("total", 0.0).is_ok());
        assert!(validate_amount("total", -1.0).is_err());
        assert!(validate_amount("total", 1.234).is_err());
        assert!(validate_amount("total", f64::NAN).is_err());
    }
}
