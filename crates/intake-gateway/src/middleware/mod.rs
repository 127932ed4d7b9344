//! Tower middleware for the intake gateway.

pub mod metrics;
pub mod rate_limit;
pub mod tracing;

pub use metrics::IntakeMetrics;
pub use rate_limit::{extract_identity, RateLimitLayer, RateLimitService};
pub use tracing::{TracingLayer, TracingService};
