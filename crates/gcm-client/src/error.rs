//! GCM client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("No API key configured for sending")]
    MissingApiKey,
}
