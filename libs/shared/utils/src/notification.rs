use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("Notification delivery failed: {0}")]
pub struct NotificationError(pub String);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    /// Event name, e.g. `appointment.confirmed` or `leave.approved`.
    pub event: String,
    pub recipient_ids: Vec<i64>,
    pub subject_id: i64,
    pub message: String,
}

impl Notification {
    pub fn new(event: impl Into<String>, subject_id: i64, recipient_ids: Vec<i64>, message: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            recipient_ids,
            subject_id,
            message: message.into(),
        }
    }
}

/// Outbound notification port. Delivery lives outside this system.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Default dispatcher: emits a structured log event per notification.
pub struct TracingNotifier;

#[async_trait]
impl NotificationDispatcher for TracingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            event = %notification.event,
            subject_id = notification.subject_id,
            recipients = ?notification.recipient_ids,
            "NOTIFY: {}", notification.message
        );
        Ok(())
    }
}

/// Fire-and-forget dispatch. Failures are logged and never reach the caller.
pub fn dispatch_detached(dispatcher: Arc<dyn NotificationDispatcher>, notification: Notification) {
    tokio::spawn(async move {
        let event = notification.event.clone();
        if let Err(e) = dispatcher.dispatch(notification).await {
            warn!(event = %event, "Notification dispatch failed: {}", e);
        }
    });
}
