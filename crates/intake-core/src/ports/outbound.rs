//! # Outbound Ports (Driven Ports)
//!
//! Interfaces the intake pipeline requires the host application to provide.
//!
//! Every piece of contended state lives behind one of the store ports below and
//! is only mutated through their atomic operations. Implementations must be
//! safe to share between any number of concurrent request handlers, and across
//! processes where the backend allows it.
//!
//! Production: `RocksDbStore` (feature `rocksdb`)
//! Testing / single instance: `InMemoryStore`

use crate::domain::entities::{EnrollmentRecord, NewEnrollment};
use crate::domain::errors::{DeliveryError, HandlerError, RenderError, StoreError};
use crate::domain::events::{CheckoutSession, Invoice, Subscription};
use crate::domain::notification::RenderedMessage;
use crate::domain::rate_limit::WindowState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Sliding-window counters keyed by `scope:identity`.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically prune entries older than `window`, then record `now` only if
    /// fewer than `limit` entries remain.
    ///
    /// Two concurrent calls for the same key must never both be admitted when
    /// only one unit of capacity remains.
    async fn hit(
        &self,
        key: &str,
        now_ms: u64,
        limit: u32,
        window: Duration,
    ) -> Result<WindowState, StoreError>;
}

/// Durable enrollment records.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Duplicate check, position assignment and insert as one atomic unit.
    ///
    /// Returns `StoreError::Duplicate` without writing if the email exists.
    /// Otherwise the new record gets `position = count + 1`, where `count`
    /// reflects every previously committed insert.
    async fn insert_next(
        &self,
        enrollment: NewEnrollment,
        created_at: DateTime<Utc>,
    ) -> Result<EnrollmentRecord, StoreError>;

    /// Number of committed records.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Look up a record by its identity key.
    async fn find_by_email(&self, email: &str) -> Result<Option<EnrollmentRecord>, StoreError>;
}

/// Idempotency markers for external event identifiers.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Insert-if-absent. Returns `true` if this call created the marker.
    async fn claim(&self, event_id: &str, claimed_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Remove a marker so a redelivery can apply the event again.
    async fn release(&self, event_id: &str) -> Result<(), StoreError>;

    /// Whether a marker exists for this identifier.
    async fn is_processed(&self, event_id: &str) -> Result<bool, StoreError>;
}

/// A backend that provides all three store ports.
pub trait SharedStore: RateLimitStore + EnrollmentStore + ProcessedEventStore {}

impl<T> SharedStore for T where T: RateLimitStore + EnrollmentStore + ProcessedEventStore {}

/// Result of a per-type billing handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The domain effect was applied.
    Applied,
    /// The event was acknowledged without effect.
    Skipped(String),
}

/// Per-type effects of authenticated payment events.
///
/// Each method is invoked at most once per external event id; the dispatcher
/// enforces that before calling in.
#[async_trait]
pub trait BillingHandler: Send + Sync {
    async fn checkout_completed(
        &self,
        event_id: &str,
        session: &CheckoutSession,
    ) -> Result<HandlerOutcome, HandlerError>;

    async fn subscription_created(
        &self,
        event_id: &str,
        subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError>;

    async fn subscription_updated(
        &self,
        event_id: &str,
        subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError>;

    async fn subscription_deleted(
        &self,
        event_id: &str,
        subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError>;

    async fn invoice_paid(
        &self,
        event_id: &str,
        invoice: &Invoice,
    ) -> Result<HandlerOutcome, HandlerError>;

    async fn invoice_payment_failed(
        &self,
        event_id: &str,
        invoice: &Invoice,
    ) -> Result<HandlerOutcome, HandlerError>;
}

/// Produces message content from a committed enrollment.
pub trait MessageRenderer: Send + Sync {
    fn render(&self, record: &EnrollmentRecord) -> Result<RenderedMessage, RenderError>;
}

/// Transactional message delivery.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send(&self, to: &str, subject: &str, content: &str) -> Result<(), DeliveryError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default time source using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Bound a store call. Elapsed time is reported as `StoreError::Timeout`.
pub async fn bounded<T, F>(limit: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
