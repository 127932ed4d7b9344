//! # Rate Limit Flow
//!
//! Admission control in front of both endpoints: per-scope thresholds,
//! window expiry, identity isolation and fail-closed behaviour when the
//! shared store is unreachable.

#[cfg(test)]
mod tests {
    use crate::fixtures::{enroll_request, event_body, Harness};
    use axum::http::StatusCode;
    use intake_core::domain::RateLimitPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    fn limited(limit: u32) -> Harness {
        Harness::with_config(|config| {
            config.rate_limit.notification = RateLimitPolicy::new(limit, Duration::from_secs(3600));
            config.rate_limit.general = RateLimitPolicy::new(limit, Duration::from_secs(3600));
        })
    }

    #[tokio::test]
    async fn test_threshold_then_window_elapse() {
        let harness = limited(3);

        for i in 0..3 {
            let response = harness.enroll("10.0.0.1", &format!("u{i}@x.com")).await;
            assert_eq!(response.status, StatusCode::CREATED);
        }

        let denied = harness.enroll("10.0.0.1", "u3@x.com").await;
        assert_eq!(denied.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            denied.body["error"],
            "Too many requests. Please try again later."
        );
        assert_eq!(denied.headers["x-ratelimit-limit"], "3");
        assert_eq!(denied.headers["x-ratelimit-remaining"], "0");
        assert!(denied.headers.contains_key("x-ratelimit-reset"));
        assert!(denied.headers.contains_key("retry-after"));

        // Denied requests never reach the sequencer.
        assert_eq!(harness.store.records().len(), 3);

        harness.clock.advance(Duration::from_secs(3601));
        let admitted = harness.enroll("10.0.0.1", "u3@x.com").await;
        assert_eq!(admitted.status, StatusCode::CREATED);
        assert_eq!(admitted.body["position"], 4);
    }

    #[tokio::test]
    async fn test_identities_and_scopes_are_independent() {
        let harness = limited(1);

        assert_eq!(
            harness.enroll("10.0.0.1", "a@x.com").await.status,
            StatusCode::CREATED
        );
        assert_eq!(
            harness.enroll("10.0.0.1", "b@x.com").await.status,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            harness.enroll("10.0.0.2", "b@x.com").await.status,
            StatusCode::CREATED
        );

        // The webhook route uses a different scope.
        let webhook = harness
            .deliver(&event_body("evt_1", "invoice.payment_succeeded"))
            .await;
        assert_eq!(webhook.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_requests_without_identity_share_anonymous_bucket() {
        let harness = limited(1);
        let body = r#"{"email":"a@x.com"}"#;

        let mut first = enroll_request("", body);
        first.headers_mut().remove("x-forwarded-for");
        let mut second = enroll_request("", r#"{"email":"b@x.com"}"#);
        second.headers_mut().remove("x-forwarded-for");

        assert_eq!(harness.send(first).await.status, StatusCode::CREATED);
        assert_eq!(
            harness.send(second).await.status,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_burst_never_exceeds_threshold() {
        let harness = Arc::new(limited(5));

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let harness = Arc::clone(&harness);
                tokio::spawn(async move {
                    harness.enroll("10.9.9.9", &format!("burst{i}@x.com")).await
                })
            })
            .collect();

        let admitted = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| r.as_ref().unwrap().status == StatusCode::CREATED)
            .count();
        assert_eq!(admitted, 5);
        assert_eq!(harness.store.records().len(), 5);
    }

    #[tokio::test]
    async fn test_store_failure_rejects_before_handler() {
        let harness = Harness::new();
        harness.store.set_rate_limit_failing(true);

        let enroll = harness.enroll("10.0.0.1", "a@x.com").await;
        assert_eq!(enroll.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(enroll.body["error"], "An unexpected error occurred");
        assert!(harness.store.records().is_empty());
        assert!(harness.delivery.sent().is_empty());

        let webhook = harness
            .deliver(&event_body("evt_1", "invoice.payment_succeeded"))
            .await;
        assert_eq!(webhook.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(harness.billing.applied().is_empty());

        harness.store.set_rate_limit_failing(false);
        assert_eq!(
            harness.enroll("10.0.0.1", "a@x.com").await.status,
            StatusCode::CREATED
        );
    }

    #[tokio::test]
    async fn test_health_and_metrics_are_not_limited() {
        let harness = limited(1);

        for _ in 0..5 {
            let health = harness
                .send(
                    axum::http::Request::get("/health")
                        .body(axum::body::Body::empty())
                        .unwrap(),
                )
                .await;
            assert_eq!(health.status, StatusCode::OK);
        }

        harness.enroll("10.0.0.1", "a@x.com").await;
        harness.enroll("10.0.0.1", "b@x.com").await;

        let metrics = harness
            .send(
                axum::http::Request::get("/metrics")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(metrics.status, StatusCode::OK);
        assert_eq!(metrics.body["rate_limiting"]["rejected"], 1);
        assert_eq!(metrics.body["enrollments"]["created"], 1);
    }
}
