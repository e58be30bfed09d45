//! Error types for the storage driver layer.

/// Errors that can occur inside a storage driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The addressed object does not exist.
    #[error("object does not exist: {0}")]
    DoesNotExist(String),

    /// Backend object storage error
    #[error("object storage error: {0}")]
    Backend(#[from] object_store::Error),

    /// IO error (stream consumption, local filesystem)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid driver configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend bucket/container missing - must be created before use
    #[error("storage bucket '{0}' does not exist. Create it before starting the hub.")]
    BucketNotFound(String),
}

impl DriverError {
    /// True when the error means the addressed object is absent.
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, DriverError::DoesNotExist(_))
    }
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
