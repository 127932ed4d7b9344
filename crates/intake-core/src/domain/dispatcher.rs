//! # Event Dispatcher
//!
//! Applies authenticated payment events at most once per provider event id.
//!
//! ```text
//! InboundEvent
//!     │
//!     ├── Unrecognized ─────────────────────────→ IgnoredUnknownType
//!     │
//!     └── known kind ── claim(id) ── false ─────→ AlreadyProcessed
//!                          │
//!                         true
//!                          │
//!                    BillingHandler ── Ok ──────→ Applied / Skipped
//!                          │
//!                         Err ── release(id) ───→ DispatchError::Handler
//! ```
//!
//! The claim is taken before the handler runs so concurrent redeliveries of
//! the same id cannot both apply it. Releasing on failure lets the provider's
//! retry apply the event later.
//!
//! Claim, handler and release run as one spawned task. A request dropped
//! mid-handler (client disconnect) does not strand the claim: the task
//! finishes on its own and releases on failure. A handler that exceeds its
//! bound is abandoned and its claim released.

use crate::domain::errors::{DispatchError, HandlerError, StoreError};
use crate::domain::events::{InboundEvent, PaymentEvent};
use crate::ports::{bounded, BillingHandler, HandlerOutcome, ProcessedEventStore, TimeSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default bound on a single billing handler call.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Processing outcome of an authenticated event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler applied the event.
    Applied,
    /// The handler acknowledged the event without effect.
    Skipped(String),
    /// Another delivery of this id already claimed it.
    AlreadyProcessed,
    /// The type is outside the handled set.
    IgnoredUnknownType,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Applied => "applied",
            DispatchOutcome::Skipped(_) => "skipped",
            DispatchOutcome::AlreadyProcessed => "already-processed",
            DispatchOutcome::IgnoredUnknownType => "ignored-unknown-type",
        }
    }
}

pub struct EventDispatcher {
    pipeline: Pipeline,
}

/// Everything the detached dispatch task owns.
#[derive(Clone)]
struct Pipeline {
    markers: Arc<dyn ProcessedEventStore>,
    handler: Arc<dyn BillingHandler>,
    clock: Arc<dyn TimeSource>,
    store_timeout: Duration,
    handler_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(
        markers: Arc<dyn ProcessedEventStore>,
        handler: Arc<dyn BillingHandler>,
        clock: Arc<dyn TimeSource>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            pipeline: Pipeline {
                markers,
                handler,
                clock,
                store_timeout,
                handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            },
        }
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline.handler_timeout = timeout;
        self
    }

    pub async fn dispatch(&self, inbound: &InboundEvent) -> Result<DispatchOutcome, DispatchError> {
        if !inbound.event.is_recognized() {
            info!(event_id = %inbound.id, kind = inbound.event.kind(), "Unhandled event type");
            return Ok(DispatchOutcome::IgnoredUnknownType);
        }

        let pipeline = self.pipeline.clone();
        let event = inbound.clone();
        let task = tokio::spawn(async move { pipeline.run(&event).await });

        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                // The task died without reaching its own release path.
                error!(event_id = %inbound.id, error = %join_err, "Dispatch task failed");
                self.pipeline.release(&inbound.id).await;
                Err(DispatchError::Handler {
                    kind: inbound.event.known_kind().unwrap_or("unrecognized"),
                    message: format!("dispatch task failed: {join_err}"),
                })
            }
        }
    }
}

impl Pipeline {
    async fn run(&self, inbound: &InboundEvent) -> Result<DispatchOutcome, DispatchError> {
        let event_id = inbound.id.as_str();
        let kind = inbound.event.kind();

        let claimed = bounded(
            self.store_timeout,
            self.markers.claim(event_id, self.clock.now()),
        )
        .await?;

        if !claimed {
            info!(event_id, kind, "Event already processed, skipping");
            return Ok(DispatchOutcome::AlreadyProcessed);
        }

        let applied = tokio::time::timeout(self.handler_timeout, self.apply(event_id, &inbound.event))
            .await
            .unwrap_or_else(|_| {
                Err(HandlerError(format!(
                    "handler timed out after {:?}",
                    self.handler_timeout
                )))
            });

        match applied {
            Ok(HandlerOutcome::Applied) => {
                info!(event_id, kind, "Event applied");
                Ok(DispatchOutcome::Applied)
            }
            Ok(HandlerOutcome::Skipped(reason)) => {
                info!(event_id, kind, reason = %reason, "Event skipped");
                Ok(DispatchOutcome::Skipped(reason))
            }
            Err(e) => {
                error!(event_id, kind, error = %e, "Webhook handler error");
                self.release(event_id).await;
                Err(DispatchError::Handler {
                    kind: inbound.event.known_kind().unwrap_or("unrecognized"),
                    message: e.0,
                })
            }
        }
    }

    async fn release(&self, event_id: &str) {
        let released: Result<(), StoreError> =
            bounded(self.store_timeout, self.markers.release(event_id)).await;
        if let Err(e) = released {
            // The marker stays; redeliveries will be acknowledged without effect.
            warn!(event_id, error = %e, "Failed to release event claim");
        }
    }

    async fn apply(&self, event_id: &str, event: &PaymentEvent) -> Result<HandlerOutcome, HandlerError> {
        match event {
            PaymentEvent::CheckoutCompleted(session) => {
                self.handler.checkout_completed(event_id, session).await
            }
            PaymentEvent::SubscriptionCreated(sub) => {
                self.handler.subscription_created(event_id, sub).await
            }
            PaymentEvent::SubscriptionUpdated(sub) => {
                self.handler.subscription_updated(event_id, sub).await
            }
            PaymentEvent::SubscriptionDeleted(sub) => {
                self.handler.subscription_deleted(event_id, sub).await
            }
            PaymentEvent::InvoicePaid(invoice) => self.handler.invoice_paid(event_id, invoice).await,
            PaymentEvent::InvoicePaymentFailed(invoice) => {
                self.handler.invoice_payment_failed(event_id, invoice).await
            }
            PaymentEvent::Unrecognized { .. } => Ok(HandlerOutcome::Skipped("unrecognized".into())),
        }
    }
}
