//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects strings that are empty once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_rejected() {
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   \t").is_err());
        assert!(validate_not_blank(" Paris ").is_ok());
    }
}
