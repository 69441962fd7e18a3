//! Error taxonomy for depot
//!
//! Every subsystem maps its failures into this taxonomy; the HTTP layer maps
//! each variant to exactly one status code. `Traversal` deliberately carries
//! no detail so the response is indistinguishable from other malformed input.

use thiserror::Error;

/// Result type alias for depot operations
pub type Result<T> = std::result::Result<T, DepotError>;

/// Main error type for depot
#[derive(Error, Debug)]
pub enum DepotError {
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("still referenced: {0}")]
    InUse(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("invalid path")]
    Traversal,

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<std::io::Error> for DepotError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DepotError::NotFound("no such file or directory".into()),
            std::io::ErrorKind::AlreadyExists => DepotError::AlreadyExists("path already exists".into()),
            std::io::ErrorKind::PermissionDenied => DepotError::Forbidden("filesystem permission denied".into()),
            _ => DepotError::Storage(err.to_string()),
        }
    }
}

impl DepotError {
    /// True for failures the caller can repair by changing the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DepotError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(DepotError::from(io), DepotError::NotFound(_)));
    }

    #[test]
    fn io_other_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        assert!(matches!(DepotError::from(io), DepotError::Storage(_)));
    }

    #[test]
    fn traversal_message_is_opaque() {
        assert_eq!(DepotError::Traversal.to_string(), "invalid path");
    }
}
