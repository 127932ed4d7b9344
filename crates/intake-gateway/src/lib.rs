//! # Intake Gateway
//!
//! HTTP surface of the intake service.
//!
//! ## Endpoints
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /enroll` | Join the waitlist; returns the assigned position |
//! | `POST /webhooks/payment-events` | Signed payment-processor events |
//! | `GET /health` | Liveness |
//! | `GET /metrics` | JSON counters |
//!
//! ## Middleware stack (outermost first)
//!
//! ```text
//! TracingLayer ─→ RequestBodyLimitLayer ─→ RateLimitLayer (per route) ─→ handler
//! ```
//!
//! The rate limiter, enrollment sequence and processed-event markers all live
//! in the shared store, so several gateway processes can sit behind one load
//! balancer when the store backend is shared.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod telemetry;

pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, GatewayError};
pub use middleware::IntakeMetrics;
pub use service::{Collaborators, IntakeService};
pub use telemetry::init_telemetry;
