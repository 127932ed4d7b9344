//! HTTP route handlers.
//!
//! | Route | Scope | Handler |
//! |-------|-------|---------|
//! | `POST /enroll` | notification | [`enroll::enroll`] |
//! | `POST /webhooks/payment-events` | general | [`webhooks::payment_events`] |
//! | `GET /health` | none | [`health::health_check`] |
//! | `GET /metrics` | none | [`health::metrics`] |

pub mod enroll;
pub mod health;
pub mod webhooks;

use crate::middleware::IntakeMetrics;
use intake_core::domain::{EnrollmentService, EventDispatcher, SignatureVerifier};
use std::sync::Arc;

pub const ENROLL_PATH: &str = "/enroll";
pub const WEBHOOK_PATH: &str = "/webhooks/payment-events";
pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub enrollment: Arc<EnrollmentService>,
    pub verifier: Arc<SignatureVerifier>,
    pub dispatcher: Arc<EventDispatcher>,
    pub metrics: Arc<IntakeMetrics>,
}
