//! Request and response bodies for the push service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub app_id: &'a str,
    pub sender_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnregisterRequest<'a> {
    pub app_id: &'a str,
}

/// Downstream message addressed to a single device.
#[derive(Debug, Clone, Serialize)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    pub data: &'a BTreeMap<String, String>,
}

/// Outcome of a downstream send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SendResult {
    /// Id assigned by the service when the message was accepted.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Error code when the message was refused for this device.
    #[serde(default)]
    pub error: Option<String>,
    /// Replacement token the sender should use from now on.
    #[serde(default, rename = "registration_id")]
    pub canonical_registration_id: Option<String>,
}

impl SendResult {
    pub fn is_success(&self) -> bool {
        self.message_id.is_some() && self.error.is_none()
    }
}

impl fmt::Display for SendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = &self.message_id {
            parts.push(format!("messageId={}", id));
        }
        if let Some(id) = &self.canonical_registration_id {
            parts.push(format!("canonicalRegistrationId={}", id));
        }
        if let Some(err) = &self.error {
            parts.push(format!("errorCode={}", err));
        }
        write!(f, "[ {} ]", parts.join(", "))
    }
}
