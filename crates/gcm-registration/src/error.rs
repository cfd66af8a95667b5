//! Registration lifecycle errors.

use gcm_client::GcmError;
use registration_store::StoreError;
use thiserror::Error;

/// Errors reported by the registration coordinator.
///
/// Cloneable so one failed in-flight registration can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// Local persistence is broken. Not the same as "not registered".
    #[error("Storage error: {0}")]
    Store(String),

    /// The push service call failed. Not retried automatically.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistrationError {
    pub fn is_network(&self) -> bool {
        matches!(self, RegistrationError::Network(_))
    }
}

impl From<StoreError> for RegistrationError {
    fn from(e: StoreError) -> Self {
        RegistrationError::Store(e.to_string())
    }
}

impl From<GcmError> for RegistrationError {
    fn from(e: GcmError) -> Self {
        RegistrationError::Network(e.to_string())
    }
}

/// Result type alias for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
