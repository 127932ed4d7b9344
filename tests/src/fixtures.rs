//! Shared harness for the integration scenarios.
//!
//! [`Harness`] wires a full gateway router over an in-memory store with a
//! controllable clock, a recording billing handler and a switchable delivery
//! client. Requests go through `tower::ServiceExt::oneshot`, so no socket is
//! bound.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use intake_core::adapters::{ConfirmationRenderer, InMemoryStore, ManualTimeSource};
use intake_core::domain::events::{CheckoutSession, Invoice, Subscription};
use intake_core::domain::signature::sign_header;
use intake_core::domain::{
    DeliveryError, EnrollmentRecord, HandlerError, NewEnrollment, RateLimitPolicy, Secret,
    StoreError, WindowState,
};
use intake_core::ports::{
    BillingHandler, DeliveryClient, EnrollmentStore, HandlerOutcome, ProcessedEventStore,
    RateLimitStore,
};
use intake_gateway::{Collaborators, GatewayConfig, IntakeMetrics, IntakeService};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const START_SECS: i64 = 1_700_000_000;

/// In-memory store whose rate-limit operation can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_rate_limit: AtomicBool,
}

impl FlakyStore {
    pub fn set_rate_limit_failing(&self, failing: bool) {
        self.fail_rate_limit.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<EnrollmentRecord> {
        self.inner.records()
    }

    pub fn marker_count(&self) -> usize {
        self.inner.marker_count()
    }
}

#[async_trait]
impl RateLimitStore for FlakyStore {
    async fn hit(
        &self,
        key: &str,
        now_ms: u64,
        limit: u32,
        window: Duration,
    ) -> Result<WindowState, StoreError> {
        if self.fail_rate_limit.load(Ordering::SeqCst) {
            return Err(StoreError::io("rate limit backend unreachable"));
        }
        self.inner.hit(key, now_ms, limit, window).await
    }
}

#[async_trait]
impl EnrollmentStore for FlakyStore {
    async fn insert_next(
        &self,
        enrollment: NewEnrollment,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<EnrollmentRecord, StoreError> {
        self.inner.insert_next(enrollment, created_at).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.inner.count().await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<EnrollmentRecord>, StoreError> {
        self.inner.find_by_email(email).await
    }
}

#[async_trait]
impl ProcessedEventStore for FlakyStore {
    async fn claim(
        &self,
        event_id: &str,
        claimed_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.claim(event_id, claimed_at).await
    }

    async fn release(&self, event_id: &str) -> Result<(), StoreError> {
        self.inner.release(event_id).await
    }

    async fn is_processed(&self, event_id: &str) -> Result<bool, StoreError> {
        self.inner.is_processed(event_id).await
    }
}

/// Billing handler that records calls and can be told to fail.
#[derive(Default)]
pub struct RecordingBilling {
    calls: Mutex<Vec<String>>,
    failures_remaining: AtomicUsize,
}

impl RecordingBilling {
    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Event ids applied successfully, in call order.
    pub fn applied(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, event_id: &str) -> Result<HandlerOutcome, HandlerError> {
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(HandlerError("billing backend unavailable".into()));
        }
        self.calls.lock().push(event_id.to_string());
        Ok(HandlerOutcome::Applied)
    }
}

#[async_trait]
impl BillingHandler for RecordingBilling {
    async fn checkout_completed(
        &self,
        event_id: &str,
        _session: &CheckoutSession,
    ) -> Result<HandlerOutcome, HandlerError> {
        self.record(event_id)
    }

    async fn subscription_created(
        &self,
        event_id: &str,
        _subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError> {
        self.record(event_id)
    }

    async fn subscription_updated(
        &self,
        event_id: &str,
        _subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError> {
        self.record(event_id)
    }

    async fn subscription_deleted(
        &self,
        event_id: &str,
        _subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError> {
        self.record(event_id)
    }

    async fn invoice_paid(
        &self,
        event_id: &str,
        _invoice: &Invoice,
    ) -> Result<HandlerOutcome, HandlerError> {
        self.record(event_id)
    }

    async fn invoice_payment_failed(
        &self,
        event_id: &str,
        _invoice: &Invoice,
    ) -> Result<HandlerOutcome, HandlerError> {
        self.record(event_id)
    }
}

/// Delivery client that captures messages, or rejects them when failing.
#[derive(Default)]
pub struct SwitchableDelivery {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl SwitchableDelivery {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// `(to, subject)` of every accepted message.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl DeliveryClient for SwitchableDelivery {
    async fn send(&self, to: &str, subject: &str, _content: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected {
                status: 503,
                body: "provider down".into(),
            });
        }
        self.sent.lock().push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

/// A response reduced to what the scenarios assert on.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Fully wired gateway for one scenario.
pub struct Harness {
    pub router: Router,
    pub store: Arc<FlakyStore>,
    pub clock: Arc<ManualTimeSource>,
    pub billing: Arc<RecordingBilling>,
    pub delivery: Arc<SwitchableDelivery>,
    pub metrics: Arc<IntakeMetrics>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Build with a config tweak applied on top of the scenario defaults.
    pub fn with_config(tweak: impl FnOnce(&mut GatewayConfig)) -> Self {
        let mut config = GatewayConfig::default();
        config.webhook.secret = Some(Secret::new(WEBHOOK_SECRET));
        config.notification.project_name = "Acme".to_string();
        config.rate_limit.notification = RateLimitPolicy::new(100, Duration::from_secs(3600));
        config.rate_limit.general = RateLimitPolicy::new(100, Duration::from_secs(3600));
        tweak(&mut config);

        let store = Arc::new(FlakyStore::default());
        let clock = Arc::new(ManualTimeSource::at_secs(START_SECS));
        let billing = Arc::new(RecordingBilling::default());
        let delivery = Arc::new(SwitchableDelivery::default());

        let collaborators = Collaborators {
            clock: clock.clone(),
            billing: billing.clone(),
            renderer: Arc::new(ConfirmationRenderer::new(
                config.notification.project_name.clone(),
            )),
            delivery: delivery.clone(),
        };

        let service = IntakeService::with_store(config, Arc::clone(&store), collaborators)
            .expect("valid test configuration");

        Self {
            router: service.router(),
            metrics: service.metrics(),
            store,
            clock,
            billing,
            delivery,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn enroll(&self, ip: &str, email: &str) -> TestResponse {
        self.send(enroll_request(ip, &json!({ "email": email }).to_string()))
            .await
    }

    /// Deliver `body` signed with the configured secret at the current time.
    pub async fn deliver(&self, body: &str) -> TestResponse {
        let timestamp = self.clock_secs();
        let header = sign_header(WEBHOOK_SECRET, timestamp, body.as_bytes());
        self.send(webhook_request(body, Some(&header))).await
    }

    pub fn clock_secs(&self) -> i64 {
        use intake_core::ports::TimeSource;
        self.clock.now().timestamp()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn enroll_request(ip: &str, body: &str) -> Request<Body> {
    Request::post("/enroll")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/webhooks/payment-events")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "198.51.100.10");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// Minimal event envelope of the given type.
pub fn event_body(id: &str, kind: &str) -> String {
    let object = match kind {
        "checkout.session.completed" => json!({
            "id": "cs_1",
            "payment_status": "paid",
            "metadata": { "userId": "user_42" }
        }),
        k if k.starts_with("customer.subscription.") => json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active"
        }),
        k if k.starts_with("invoice.") => json!({
            "id": "in_1",
            "customer": "cus_1",
            "amount_paid": 1900,
            "currency": "usd"
        }),
        _ => json!({ "id": "obj_1" }),
    };
    json!({
        "id": id,
        "type": kind,
        "created": START_SECS,
        "livemode": false,
        "data": { "object": object }
    })
    .to_string()
}
