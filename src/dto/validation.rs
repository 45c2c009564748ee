//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a join code is 4 to 12 alphanumeric characters.
///
/// Codes are case-insensitive on the wire; casing is normalized later, so
/// both `purple7` and `PURPLE7` pass here.
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    if !(4..=12).contains(&code.len()) {
        let mut err = ValidationError::new("join_code_length");
        err.message =
            Some(format!("Join code must be 4 to 12 characters (got {})", code.len()).into());
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("join_code_format");
        err.message = Some("Join code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a CSS-style hex color such as `#7c3aed`.
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if !valid {
        let mut err = ValidationError::new("hex_color_format");
        err.message = Some("Color must be a hex string like #7c3aed".into());
        return Err(err);
    }

    Ok(())
}
