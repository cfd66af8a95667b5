//! Registration storage errors.

use thiserror::Error;

/// Errors raised while reading or writing persisted registration state.
///
/// Every variant means the storage backend is unusable for the current
/// operation. Callers must not treat these as "not registered".
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
