//! Ports for the intake pipeline.

pub mod outbound;

pub use outbound::{
    bounded, BillingHandler, DeliveryClient, EnrollmentStore, HandlerOutcome, MessageRenderer,
    ProcessedEventStore, RateLimitStore, SharedStore, SystemTimeSource, TimeSource,
};
