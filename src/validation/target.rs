use crate::error::{AppError, Result};

/// Rejects gateway targets that are not same-origin relative paths.
///
/// Runs before any network I/O.
pub fn validate_target_path(target_path: &str) -> Result<()> {
    if target_path.is_empty() {
        return Err(AppError::InvalidTarget("empty target path".to_string()));
    }

    if target_path.contains("..") {
        return Err(AppError::InvalidTarget(format!(
            "path traversal in {:?}",
            target_path
        )));
    }

    if target_path.starts_with("http") {
        return Err(AppError::InvalidTarget(format!(
            "absolute URL {:?}",
            target_path
        )));
    }

    // Without a leading slash the path would be glued onto the host (`origin@evil.com`).
    if !target_path.starts_with('/') {
        return Err(AppError::InvalidTarget(format!(
            "target {:?} is not an absolute path",
            target_path
        )));
    }

    Ok(())
}
