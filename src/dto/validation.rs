//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::room_code::RoomCode;

/// Longest display name accepted, in characters (after trimming).
pub const DISPLAY_NAME_MAX_LEN: usize = 24;

/// Validates that a display name is non-blank, bounded, and free of control characters.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Ada")          // Ok
/// validate_display_name("   ")          // Err - blank
/// validate_display_name("a\u{7}b")      // Err - control character
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > DISPLAY_NAME_MAX_LEN {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("Display name must be at most {DISPLAY_NAME_MAX_LEN} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("display_name_format");
        err.message = Some("Display name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a room code has the expected shape (case-insensitive).
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    RoomCode::parse(code).map(|_| ()).map_err(|parse_err| {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some(parse_err.to_string().into());
        err
    })
}
