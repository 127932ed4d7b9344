//! # Notification Trigger
//!
//! Best-effort confirmation message after a committed enrollment.
//!
//! Runs as its own stage with its own failure boundary: rendering errors,
//! delivery errors, timeouts and panics inside the delivery client all end up
//! as [`NotifyOutcome::Failed`]. Nothing here can change the enrollment result.

use crate::domain::entities::EnrollmentRecord;
use crate::ports::{DeliveryClient, MessageRenderer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Rendered message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub content: String,
}

/// Result of the notification stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// Disabled by configuration.
    Suppressed,
    Failed(String),
}

impl NotifyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyOutcome::Sent => "sent",
            NotifyOutcome::Suppressed => "suppressed",
            NotifyOutcome::Failed(_) => "failed",
        }
    }
}

pub struct NotificationTrigger {
    renderer: Arc<dyn MessageRenderer>,
    delivery: Arc<dyn DeliveryClient>,
    enabled: bool,
    timeout: Duration,
}

impl NotificationTrigger {
    pub fn new(
        renderer: Arc<dyn MessageRenderer>,
        delivery: Arc<dyn DeliveryClient>,
        enabled: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            delivery,
            enabled,
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn notify(&self, record: &EnrollmentRecord) -> NotifyOutcome {
        if !self.enabled {
            return NotifyOutcome::Suppressed;
        }

        let message = match self.renderer.render(record) {
            Ok(message) => message,
            Err(e) => {
                warn!(email = %record.email, error = %e, "Failed to render confirmation email");
                return NotifyOutcome::Failed(e.to_string());
            }
        };

        let delivery = Arc::clone(&self.delivery);
        let to = record.email.clone();
        let send = tokio::spawn(async move {
            delivery
                .send(&to, &message.subject, &message.content)
                .await
        });

        let outcome = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(Ok(()))) => NotifyOutcome::Sent,
            Ok(Ok(Err(e))) => NotifyOutcome::Failed(e.to_string()),
            Ok(Err(join_err)) => NotifyOutcome::Failed(format!("delivery task aborted: {join_err}")),
            Err(_) => NotifyOutcome::Failed(format!("delivery timed out after {:?}", self.timeout)),
        };

        match &outcome {
            NotifyOutcome::Sent => info!(email = %record.email, "Confirmation email sent"),
            NotifyOutcome::Failed(reason) => {
                warn!(email = %record.email, reason = %reason, "Failed to send confirmation email")
            }
            NotifyOutcome::Suppressed => {}
        }

        outcome
    }
}
