//! The hub's client-facing error taxonomy.
//!
//! Internal code raises these typed errors; translation to HTTP status codes
//! happens once, at the transport boundary. Fine-grained authorization
//! failure reasons ([`crate::auth::AuthError`]) are collapsed into the single
//! [`HubError::Validation`] category before they reach a client; the
//! distinction survives only in logs.

use drivers::DriverError;

/// Errors surfaced by hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Authorization, scope, or request-shape failure.
    #[error("{0}")]
    Validation(String),

    /// The social-proof gate rejected the principal.
    #[error("not enough social proofs for {0}")]
    NotEnoughProof(String),

    /// Declared or observed upload size over the limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Write addressed a reserved object name.
    #[error("reserved object name: {0}")]
    ConflictingName(String),

    /// Failure from the storage backend.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl HubError {
    /// True when the underlying driver reported a missing object.
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, HubError::Driver(e) if e.is_does_not_exist())
    }
}

/// Result type alias for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
