//! # Enrollment Flow
//!
//! `POST /enroll` end to end: validation, gapless positions under
//! concurrency, duplicate handling and the best-effort confirmation stage.

#[cfg(test)]
mod tests {
    use crate::fixtures::{enroll_request, Harness};
    use axum::http::StatusCode;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequence_with_concurrent_middle_and_duplicate() {
        let harness = Arc::new(Harness::new());

        let first = harness.enroll("10.0.0.1", "a@x.com").await;
        assert_eq!(first.status, StatusCode::CREATED);
        assert_eq!(first.body["position"], 1);

        let (b, c) = tokio::join!(
            harness.enroll("10.0.0.2", "b@x.com"),
            harness.enroll("10.0.0.3", "c@x.com"),
        );
        assert_eq!(b.status, StatusCode::CREATED);
        assert_eq!(c.status, StatusCode::CREATED);
        let positions: BTreeSet<u64> = [&b, &c]
            .iter()
            .map(|r| r.body["position"].as_u64().unwrap())
            .collect();
        assert_eq!(positions, BTreeSet::from([2, 3]));

        let again = harness.enroll("10.0.0.1", "a@x.com").await;
        assert_eq!(again.status, StatusCode::BAD_REQUEST);
        assert_eq!(again.body["error"], "Email already on waitlist");
        assert_eq!(harness.store.records().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_many_concurrent_enrollments_are_gapless() {
        let harness = Arc::new(Harness::new());
        let n = 60u64;

        let tasks: Vec<_> = (0..n)
            .map(|i| {
                let harness = Arc::clone(&harness);
                tokio::spawn(async move {
                    harness
                        .enroll(&format!("10.1.0.{i}"), &format!("user{i}@x.com"))
                        .await
                })
            })
            .collect();

        let mut positions = BTreeSet::new();
        for task in futures::future::join_all(tasks).await {
            let response = task.unwrap();
            assert_eq!(response.status, StatusCode::CREATED);
            assert!(positions.insert(response.body["position"].as_u64().unwrap()));
        }

        assert_eq!(positions, (1..=n).collect::<BTreeSet<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_repeats_of_one_email_store_one_record() {
        let harness = Arc::new(Harness::new());

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let harness = Arc::clone(&harness);
                tokio::spawn(async move {
                    harness.enroll(&format!("10.2.0.{i}"), "same@x.com").await
                })
            })
            .collect();

        let mut created = 0;
        let mut duplicates = 0;
        for task in futures::future::join_all(tasks).await {
            match task.unwrap().status {
                StatusCode::CREATED => created += 1,
                StatusCode::BAD_REQUEST => duplicates += 1,
                other => panic!("unexpected status {other}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(duplicates, 19);
        assert_eq!(harness.store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_is_sent_after_commit() {
        let harness = Harness::new();

        let response = harness.enroll("10.0.0.1", "a@x.com").await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(
            harness.delivery.sent(),
            vec![(
                "a@x.com".to_string(),
                "You're on the Acme waitlist!".to_string()
            )]
        );
        assert_eq!(harness.metrics.to_json()["notifications"]["sent"], 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_still_returns_created() {
        let harness = Harness::new();
        harness.delivery.set_failing(true);

        let response = harness.enroll("10.0.0.1", "a@x.com").await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body["success"], true);
        assert_eq!(response.body["position"], 1);
        assert_eq!(harness.store.records().len(), 1);
        assert_eq!(harness.metrics.to_json()["notifications"]["failed"], 1);
    }

    #[tokio::test]
    async fn test_disabled_confirmation_is_suppressed() {
        let harness = Harness::with_config(|config| config.notification.enabled = false);

        let response = harness.enroll("10.0.0.1", "a@x.com").await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert!(harness.delivery.sent().is_empty());
        assert_eq!(harness.metrics.to_json()["notifications"]["suppressed"], 1);
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let harness = Harness::new();

        for body in [
            r#"{"email":"nope"}"#,
            r#"{"name":"Ada"}"#,
            r#"{"email":"a@x.com","name":"A"}"#,
            r#"{"email":42}"#,
            "not json",
        ] {
            let response = harness.send(enroll_request("10.0.0.1", body)).await;
            assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(response.body["message"], "Invalid input");
            assert!(response.body["errors"].is_array());
        }

        assert!(harness.store.records().is_empty());
        assert!(harness.delivery.sent().is_empty());
    }

    #[tokio::test]
    async fn test_email_is_trimmed_before_duplicate_check() {
        let harness = Harness::new();

        assert_eq!(
            harness.enroll("10.0.0.1", "a@x.com").await.status,
            StatusCode::CREATED
        );
        assert_eq!(
            harness.enroll("10.0.0.1", "  a@x.com  ").await.status,
            StatusCode::BAD_REQUEST
        );
    }
}
