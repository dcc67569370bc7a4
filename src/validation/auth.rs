use crate::error::{AppError, Result};

/// Validates a portal username (the student's registration number).
///
/// # Arguments
///
/// * `username` - The username to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the username is valid.
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }

    if username.len() > 255 {
        return Err(AppError::Validation(
            "Username must be at most 255 characters".to_string(),
        ));
    }

    if username.chars().any(|c| c.is_control()) {
        return Err(AppError::Validation(
            "Username cannot contain control characters".to_string(),
        ));
    }

    Ok(())
}

/// Validates a portal password.
///
/// The portal owns the password policy, so only emptiness and size are checked.
pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    Ok(())
}
