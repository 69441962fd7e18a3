//! Shared validation utilities

use thiserror::Error;

/// Errors from name validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    #[error("Name is required and cannot be empty")]
    Required,

    #[error("Name must be between 1 and {max_length} characters")]
    TooLong { max_length: usize },

    #[error("Name cannot contain path separators")]
    PathSeparator,
}

/// Validate an entity name (pool, zone, policy, file name).
///
/// # Rules
/// - Must not be empty after trimming
/// - Must not exceed max_length characters
/// - Must not contain `/` or NUL
pub fn validate_name(name: &str, max_length: usize) -> Result<(), NameValidationError> {
    if name.trim().is_empty() {
        return Err(NameValidationError::Required);
    }
    if name.len() > max_length {
        return Err(NameValidationError::TooLong { max_length });
    }
    if name.contains('/') || name.contains('\0') {
        return Err(NameValidationError::PathSeparator);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        assert!(validate_name("team-share", 255).is_ok());
        assert!(validate_name("отчёт 2025.pdf", 255).is_ok());
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(validate_name("", 255), Err(NameValidationError::Required));
        assert_eq!(validate_name("   ", 255), Err(NameValidationError::Required));
    }

    #[test]
    fn rejects_overlong() {
        let long = "a".repeat(256);
        assert_eq!(
            validate_name(&long, 255),
            Err(NameValidationError::TooLong { max_length: 255 })
        );
    }

    #[test]
    fn rejects_separators() {
        assert_eq!(
            validate_name("a/b", 255),
            Err(NameValidationError::PathSeparator)
        );
    }
}
