//! Push service HTTP client.

use crate::error::GcmError;
use crate::types::*;
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Initial delay between send attempts; doubles after each retry.
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Client for the push registration and send endpoints.
///
/// Constructed explicitly and passed to whoever needs it; there is no
/// process-wide instance.
#[derive(Clone)]
pub struct GcmClient {
    client: Client,
    base_url: String,
    app_id: String,
    api_key: Option<String>,
    retry_backoff: Duration,
}

impl GcmClient {
    /// Create a new client for `app_id`. `timeout` bounds every request.
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GcmError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            api_key: None,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Attach the server API key required by [`GcmClient::send`].
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the initial delay between send retries.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Application id sent with registration requests.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Check if the push service is reachable.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Obtain a registration token for `sender_id`.
    #[instrument(skip(self), fields(app_id = %self.app_id))]
    pub async fn register(&self, sender_id: &str) -> Result<String, GcmError> {
        let body = RegisterRequest {
            app_id: &self.app_id,
            sender_id,
        };

        debug!("Sending registration request");

        let response = self
            .client
            .post(format!("{}/v1/register", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Registration failed");
            return Err(GcmError::Api(format!(
                "Registration failed: {} - {}",
                status, body
            )));
        }

        let result: RegisterResponse = response.json().await?;

        if let Some(error) = result.error {
            warn!(error = %error, "Registration rejected");
            return Err(GcmError::Rejected(error));
        }

        match result.token {
            Some(token) if !token.is_empty() => {
                debug!("Device registered");
                Ok(token)
            }
            _ => Err(GcmError::Rejected("empty registration token".into())),
        }
    }

    /// Revoke this application's registration.
    #[instrument(skip(self), fields(app_id = %self.app_id))]
    pub async fn unregister(&self) -> Result<(), GcmError> {
        let body = UnregisterRequest {
            app_id: &self.app_id,
        };

        debug!("Sending unregister request");

        let response = self
            .client
            .post(format!("{}/v1/unregister", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Unregister failed");
            return Err(GcmError::Api(format!(
                "Unregister failed: {} - {}",
                status, body
            )));
        }

        debug!("Device unregistered");
        Ok(())
    }

    /// Send a data message to one device.
    ///
    /// Server errors (5xx) are retried up to `retries` more times with
    /// exponential backoff. Any other failure is returned immediately.
    #[instrument(skip(self, data))]
    pub async fn send(
        &self,
        device_id: &str,
        data: &BTreeMap<String, String>,
        retries: u32,
    ) -> Result<SendResult, GcmError> {
        let api_key = self.api_key.as_deref().ok_or(GcmError::MissingApiKey)?;
        let body = SendRequest {
            to: device_id,
            data,
        };

        let mut backoff = self.retry_backoff;
        let mut attempt = 0;

        loop {
            match self.send_once(api_key, &body).await {
                Err(GcmError::Unavailable(msg)) if attempt < retries => {
                    attempt += 1;
                    warn!(attempt, error = %msg, "Push service unavailable, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }

    async fn send_once(
        &self,
        api_key: &str,
        body: &SendRequest<'_>,
    ) -> Result<SendResult, GcmError> {
        let response = self
            .client
            .post(format!("{}/v1/send", self.base_url))
            .header("Authorization", format!("key={}", api_key))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GcmError::Unavailable(format!("{} - {}", status, body)));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(GcmError::Rejected("invalid API key".into()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Send failed");
            return Err(GcmError::Api(format!("Send failed: {} - {}", status, body)));
        }

        let result: SendResult = response.json().await?;
        debug!(result = %result, "Send completed");
        Ok(result)
    }
}
