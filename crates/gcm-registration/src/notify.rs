//! Delivered push events and notification forwarding.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Title used for every notification produced by the dispatcher.
pub const NOTIFICATION_TITLE: &str = "GCM Notification";

/// A `(title, body)` pair handed to the platform for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Receives notifications to render.
pub trait NotificationForwarder: Send + Sync {
    fn forward(&self, notification: &Notification);
}

/// Forwarder that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogForwarder;

impl NotificationForwarder for LogForwarder {
    fn forward(&self, notification: &Notification) {
        info!(title = %notification.title, body = %notification.body, "Notification");
    }
}

/// Kind of event carried by a delivered push payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// An upstream message could not be sent.
    SendError,
    /// The server dropped pending messages for this device.
    Deleted { total: u64 },
    /// Regular data message.
    Message(Map<String, Value>),
}

impl PushEvent {
    /// Classify a payload by its `message_type` field.
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        match payload.get("message_type").and_then(Value::as_str) {
            Some("send_error") => PushEvent::SendError,
            Some("deleted_messages") => PushEvent::Deleted {
                total: payload.get("total_deleted").map(parse_count).unwrap_or(0),
            },
            _ => PushEvent::Message(payload.clone()),
        }
    }

    /// Body text shown for this event.
    pub fn body(&self) -> String {
        match self {
            PushEvent::SendError => "Send error".to_string(),
            PushEvent::Deleted { total } => format!("Deleted messages on server: {}", total),
            PushEvent::Message(data) => {
                format!("Received: {}", Value::Object(data.clone()))
            }
        }
    }
}

// The service sends counts as strings or numbers
fn parse_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Turns delivered payloads into notifications.
#[derive(Clone)]
pub struct MessageDispatcher {
    forwarder: Arc<dyn NotificationForwarder>,
}

impl MessageDispatcher {
    pub fn new(forwarder: Arc<dyn NotificationForwarder>) -> Self {
        Self { forwarder }
    }

    /// Classify `payload`, forward a notification for it and return the event.
    pub fn dispatch(&self, payload: &Map<String, Value>) -> PushEvent {
        let event = PushEvent::from_payload(payload);
        debug!(?event, "Dispatching push event");

        self.forwarder
            .forward(&Notification::new(NOTIFICATION_TITLE, event.body()));
        event
    }
}
