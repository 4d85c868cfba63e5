//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest session, user or drill identifier accepted on the wire.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validates an opaque identifier (session, user or drill id).
///
/// # Examples
///
/// ```ignore
/// validate_identifier("sess-42")   // Ok
/// validate_identifier("")          // Err - empty
/// validate_identifier("  ")        // Err - blank
/// validate_identifier("a\u{7}b")   // Err - control character
/// ```
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    let length = id.chars().count();
    if id.trim().is_empty() || length > MAX_IDENTIFIER_LENGTH {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "identifier must contain 1 to {MAX_IDENTIFIER_LENGTH} non-blank characters (got {length})"
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_control) {
        let mut err = ValidationError::new("identifier_format");
        err.message = Some("identifier must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}
