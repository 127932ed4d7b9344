//! Intake counters, exported as JSON on `/metrics`.

use intake_core::domain::{DispatchOutcome, NotifyOutcome};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide intake metrics
#[derive(Debug, Default)]
pub struct IntakeMetrics {
    // Request counters
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,

    // Rate limit counters
    pub rate_limit_rejected: AtomicU64,
    pub rate_limit_store_errors: AtomicU64,

    // Enrollment counters
    pub enrollments_created: AtomicU64,
    pub enrollments_duplicate: AtomicU64,
    pub enrollments_invalid: AtomicU64,

    // Webhook counters
    pub webhooks_verified: AtomicU64,
    pub webhooks_rejected: AtomicU64,
    pub webhooks_applied: AtomicU64,
    pub webhooks_skipped: AtomicU64,
    pub webhooks_ignored: AtomicU64,
    pub webhooks_duplicate: AtomicU64,
    pub dispatch_failures: AtomicU64,

    // Notification counters
    pub notifications_sent: AtomicU64,
    pub notifications_failed: AtomicU64,
    pub notifications_suppressed: AtomicU64,
}

impl IntakeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record rate limit rejection
    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rate limit store failure (request rejected)
    pub fn record_rate_limit_store_error(&self) {
        self.rate_limit_store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrollment_created(&self) {
        self.enrollments_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrollment_duplicate(&self) {
        self.enrollments_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrollment_invalid(&self) {
        self.enrollments_invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_rejected(&self) {
        self.webhooks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_webhook_verified(&self) {
        self.webhooks_verified.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how an authenticated event was handled
    pub fn record_dispatch(&self, outcome: &DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Applied => &self.webhooks_applied,
            DispatchOutcome::Skipped(_) => &self.webhooks_skipped,
            DispatchOutcome::AlreadyProcessed => &self.webhooks_duplicate,
            DispatchOutcome::IgnoredUnknownType => &self.webhooks_ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the notification stage result
    pub fn record_notification(&self, outcome: &NotifyOutcome) {
        let counter = match outcome {
            NotifyOutcome::Sent => &self.notifications_sent,
            NotifyOutcome::Failed(_) => &self.notifications_failed,
            NotifyOutcome::Suppressed => &self.notifications_suppressed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        serde_json::json!({
            "requests": {
                "total": load(&self.requests_total),
                "success": load(&self.requests_success),
                "error": load(&self.requests_error),
            },
            "rate_limiting": {
                "rejected": load(&self.rate_limit_rejected),
                "store_errors": load(&self.rate_limit_store_errors),
            },
            "enrollments": {
                "created": load(&self.enrollments_created),
                "duplicate": load(&self.enrollments_duplicate),
                "invalid": load(&self.enrollments_invalid),
            },
            "webhooks": {
                "verified": load(&self.webhooks_verified),
                "rejected": load(&self.webhooks_rejected),
                "applied": load(&self.webhooks_applied),
                "skipped": load(&self.webhooks_skipped),
                "ignored": load(&self.webhooks_ignored),
                "duplicate": load(&self.webhooks_duplicate),
                "dispatch_failures": load(&self.dispatch_failures),
            },
            "notifications": {
                "sent": load(&self.notifications_sent),
                "failed": load(&self.notifications_failed),
                "suppressed": load(&self.notifications_suppressed),
            }
        })
    }
}
