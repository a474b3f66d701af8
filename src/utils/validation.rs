//! Input validation helpers
//!
//! Centralized text length constants and validation functions.
//! SQLite TEXT has no built-in length enforcement, so limits are applied
//! here before anything is persisted.

use crate::utils::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Request content: long enough to say something, short enough to read
/// off a waiter terminal.
pub const MIN_CONTENT_LEN: usize = 3;
pub const MAX_CONTENT_LEN: usize = 500;

/// Item names as shown on order summaries.
pub const MAX_NAME_LEN: usize = 200;

/// Notes, instructions, rejection reasons.
pub const MAX_NOTE_LEN: usize = 500;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.chars().count()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: Option<&str>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.chars().count() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.chars().count()
        )));
    }
    Ok(())
}

/// Validate request content length (counted in chars, not bytes).
pub fn validate_content(content: &str) -> Result<(), AppError> {
    let len = content.chars().count();
    if !(MIN_CONTENT_LEN..=MAX_CONTENT_LEN).contains(&len) {
        return Err(AppError::validation(format!(
            "content must be {MIN_CONTENT_LEN}-{MAX_CONTENT_LEN} chars, got {len}"
        )));
    }
    Ok(())
}

/// Table numbers are 1-based.
pub fn validate_table_number(table_number: i64) -> Result<(), AppError> {
    if table_number < 1 {
        return Err(AppError::validation(format!(
            "invalid table number: {table_number}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_bounds() {
        assert!(validate_content("ok").is_err());
        assert!(validate_content("oké").is_ok()); // 3 chars, 4 bytes
        assert!(validate_content(&"x".repeat(500)).is_ok());
        assert!(validate_content(&"x".repeat(501)).is_err());
    }

    #[test]
    fn table_number_must_be_positive() {
        assert!(validate_table_number(0).is_err());
        assert!(validate_table_number(-3).is_err());
        assert!(validate_table_number(1).is_ok());
    }
}
