//! HTTP client for a GCM-style push service.
//!
//! Covers device registration and revocation on the client side and
//! single-device downstream sends on the server side.

mod client;
mod error;
mod types;

pub use client::GcmClient;
pub use error::GcmError;
pub use types::SendResult;
