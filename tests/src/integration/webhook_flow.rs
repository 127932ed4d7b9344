//! # Payment Webhook Flow
//!
//! `POST /webhooks/payment-events` end to end: fail-closed verification,
//! at-most-once application per event id, and claim release on failure.

#[cfg(test)]
mod tests {
    use crate::fixtures::{event_body, webhook_request, Harness, WEBHOOK_SECRET};
    use axum::http::StatusCode;
    use intake_core::domain::signature::sign_header;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_authenticated_event_is_applied_once() {
        let harness = Harness::new();
        let body = event_body("evt_1", "invoice.payment_succeeded");

        let response = harness.deliver(&body).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["received"], true);
        assert_eq!(harness.billing.applied(), vec!["evt_1".to_string()]);
    }

    #[tokio::test]
    async fn test_redelivery_is_acknowledged_without_effect() {
        let harness = Harness::new();
        let body = event_body("evt_1", "customer.subscription.updated");

        for _ in 0..3 {
            let response = harness.deliver(&body).await;
            assert_eq!(response.status, StatusCode::OK);
        }

        assert_eq!(harness.billing.applied().len(), 1);
        assert_eq!(harness.metrics.to_json()["webhooks"]["duplicate"], 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_redeliveries_apply_once() {
        let harness = Arc::new(Harness::new());
        let body = event_body("evt_race", "checkout.session.completed");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let harness = Arc::clone(&harness);
                let body = body.clone();
                tokio::spawn(async move { harness.deliver(&body).await })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap().status, StatusCode::OK);
        }
        assert_eq!(harness.billing.applied(), vec!["evt_race".to_string()]);
    }

    #[tokio::test]
    async fn test_handler_failure_releases_claim_for_retry() {
        let harness = Harness::new();
        harness.billing.fail_next(1);
        let body = event_body("evt_retry", "invoice.payment_failed");

        let failed = harness.deliver(&body).await;
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.body["error"], "Failed to process webhook");
        assert!(harness.billing.applied().is_empty());
        assert_eq!(harness.store.marker_count(), 0);

        let retried = harness.deliver(&body).await;
        assert_eq!(retried.status, StatusCode::OK);
        assert_eq!(harness.billing.applied(), vec!["evt_retry".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_type_acknowledged_without_dispatch() {
        let harness = Harness::new();

        let response = harness
            .deliver(&event_body("evt_other", "customer.created"))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["received"], true);
        assert!(harness.billing.applied().is_empty());
        assert_eq!(harness.store.marker_count(), 0);
        assert_eq!(harness.metrics.to_json()["webhooks"]["ignored"], 1);
    }

    #[tokio::test]
    async fn test_missing_signature_rejected() {
        let harness = Harness::new();
        let body = event_body("evt_1", "invoice.payment_succeeded");

        let response = harness.send(webhook_request(&body, None)).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "Missing Stripe signature");
        assert!(harness.billing.applied().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_body_rejected() {
        let harness = Harness::new();
        let body = event_body("evt_1", "invoice.payment_succeeded");
        let header = sign_header(WEBHOOK_SECRET, harness.clock_secs(), body.as_bytes());
        let tampered = body.replace("1900", "1901");

        let response = harness.send(webhook_request(&tampered, Some(&header))).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "Invalid webhook payload");
        assert!(harness.billing.applied().is_empty());
        assert_eq!(harness.store.marker_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_signature_rejected() {
        let harness = Harness::new();
        let body = event_body("evt_1", "invoice.payment_succeeded");
        let header = sign_header(WEBHOOK_SECRET, harness.clock_secs(), body.as_bytes());

        harness.clock.advance(Duration::from_secs(301));

        let response = harness.send(webhook_request(&body, Some(&header))).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(harness.billing.applied().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_secret_rejects_everything() {
        let harness = Harness::with_config(|config| config.webhook.secret = None);
        let body = event_body("evt_1", "invoice.payment_succeeded");

        let response = harness.deliver(&body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "Invalid webhook payload");
        assert!(harness.billing.applied().is_empty());
    }

    #[tokio::test]
    async fn test_signed_but_unparseable_payload_rejected() {
        let harness = Harness::new();

        let response = harness.deliver("{\"hello\":\"world\"}").await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "Invalid webhook payload");
    }
}
