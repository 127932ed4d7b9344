//! # Intake Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Rate limiting | sliding-window `apply_hit`, full `admit` over the in-memory store |
//! | Webhooks | HMAC verification, envelope parsing |
//! | Enrollment | sequenced insert |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use intake_core::adapters::{InMemoryStore, ManualTimeSource};
use intake_core::domain::rate_limit::apply_hit;
use intake_core::domain::signature::sign_header;
use intake_core::domain::{
    parse_event, EnrollmentRequest, EnrollmentSequencer, RateLimitPolicies, RateLimiter, Scope,
    Secret, SignatureVerifier,
};
use intake_core::ports::TimeSource;
use std::sync::Arc;
use std::time::Duration;

const NOW_SECS: i64 = 1_700_000_000;
const SECRET: &str = "whsec_bench";

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Rate limiting
// ============================================================================

fn bench_sliding_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate-limit-window");
    let window = Duration::from_secs(3600);

    for occupancy in [0usize, 10, 100, 1000] {
        let base: Vec<u64> = (0..occupancy as u64).map(|i| i * 1_000).collect();
        let now_ms = occupancy as u64 * 1_000;

        group.bench_with_input(
            BenchmarkId::new("apply_hit", occupancy),
            &base,
            |b, base| {
                b.iter_batched(
                    || base.clone(),
                    |mut entries| black_box(apply_hit(&mut entries, now_ms, 10_000, window)),
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_admit(c: &mut Criterion) {
    let rt = runtime();
    let clock = Arc::new(ManualTimeSource::at_secs(NOW_SECS));
    let limiter = RateLimiter::new(
        Arc::new(InMemoryStore::new()),
        clock.clone(),
        RateLimitPolicies::default(),
        Duration::from_secs(1),
    );

    let mut group = c.benchmark_group("rate-limit-admit");
    let identities: Vec<String> = (0..256).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
    group.throughput(Throughput::Elements(identities.len() as u64));
    group.bench_function("admit_distinct_identities", |b| {
        b.iter(|| {
            rt.block_on(async {
                for identity in &identities {
                    black_box(limiter.admit(identity, Scope::General).await.ok());
                }
            });
            clock.advance(Duration::from_secs(3601));
        })
    });
    group.finish();
}

// ============================================================================
// Webhooks
// ============================================================================

fn event_payload(size: usize) -> Vec<u8> {
    serde_json::json!({
        "id": "evt_bench",
        "type": "invoice.payment_succeeded",
        "created": NOW_SECS,
        "livemode": false,
        "data": { "object": {
            "id": "in_1",
            "customer": "cus_1",
            "amount_paid": 1900,
            "currency": "usd",
            "description": "x".repeat(size),
        }}
    })
    .to_string()
    .into_bytes()
}

fn bench_signature_verification(c: &mut Criterion) {
    let clock = Arc::new(ManualTimeSource::at_secs(NOW_SECS));
    let verifier = SignatureVerifier::new(
        Some(Secret::new(SECRET)),
        Duration::from_secs(300),
        clock.clone(),
    );

    let mut group = c.benchmark_group("webhook-signature");
    for size in [256usize, 4 * 1024, 60 * 1024] {
        let payload = event_payload(size);
        let header = sign_header(SECRET, clock.now().timestamp(), &payload);

        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("verify", size),
            &(payload, header),
            |b, (payload, header)| b.iter(|| black_box(verifier.verify(payload, Some(header)).is_ok())),
        );
    }
    group.finish();
}

fn bench_event_parsing(c: &mut Criterion) {
    let payload = event_payload(256);
    c.bench_function("webhook-parse-envelope", |b| {
        b.iter(|| black_box(parse_event(&payload).is_ok()))
    });
}

// ============================================================================
// Enrollment
// ============================================================================

fn bench_sequenced_insert(c: &mut Criterion) {
    let rt = runtime();
    let sequencer = EnrollmentSequencer::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(ManualTimeSource::at_secs(NOW_SECS)),
        Duration::from_secs(1),
    );
    let mut next = 0u64;

    c.bench_function("enrollment-insert-next", |b| {
        b.iter(|| {
            next += 1;
            let request = EnrollmentRequest {
                email: Some(format!("bench{next}@example.com")),
                name: None,
            };
            black_box(rt.block_on(sequencer.enroll(request)).is_ok())
        })
    });
}

criterion_group!(
    benches,
    bench_sliding_window,
    bench_admit,
    bench_signature_verification,
    bench_event_parsing,
    bench_sequenced_insert,
);
criterion_main!(benches);
