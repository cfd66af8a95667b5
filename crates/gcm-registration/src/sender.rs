//! Remote registration capability.

use crate::error::RegistrationResult;
use async_trait::async_trait;
use gcm_client::GcmClient;

/// Which push project to register against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub sender_id: String,
}

impl RegistrationRequest {
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
        }
    }
}

/// Network side of registration: obtain or revoke a token.
///
/// Implementations own their timeouts and report them as ordinary failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSender: Send + Sync {
    /// Obtain a registration token.
    async fn register(&self, request: &RegistrationRequest) -> RegistrationResult<String>;

    /// Revoke the current registration.
    async fn unregister(&self) -> RegistrationResult<()>;
}

#[async_trait]
impl RemoteSender for GcmClient {
    async fn register(&self, request: &RegistrationRequest) -> RegistrationResult<String> {
        Ok(GcmClient::register(self, &request.sender_id).await?)
    }

    async fn unregister(&self) -> RegistrationResult<()> {
        Ok(GcmClient::unregister(self).await?)
    }
}
