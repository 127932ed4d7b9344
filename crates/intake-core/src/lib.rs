//! Intake Core - domain logic for the signup and billing intake service.
//!
//! # Architecture
//!
//! ```text
//!   request
//!      │
//!      ▼
//! ┌──────────────┐   denied    ┌─────────┐
//! │ RateLimiter  │────────────→│   429   │
//! └──────┬───────┘             └─────────┘
//!        │ admitted
//!        ├───────────────────────────────┐
//!        ▼                               ▼
//! ┌──────────────────┐        ┌────────────────────┐
//! │ EnrollmentService│        │ SignatureVerifier  │
//! │  1. Sequencer    │        └─────────┬──────────┘
//! │  2. Notification │                  ▼
//! └────────┬─────────┘        ┌────────────────────┐
//!          │                  │  EventDispatcher   │──→ BillingHandler
//!          │                  └─────────┬──────────┘
//!          ▼                            ▼
//! ┌──────────────────────────────────────────────────┐
//! │ SharedStore: windows │ enrollments │ event marks │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Contended state only changes through the atomic operations on the store
//! ports in [`ports`]. Nothing is cached in process memory between requests,
//! so any number of handler instances can share one store.
//!
//! # Usage
//!
//! ```ignore
//! use intake_core::adapters::InMemoryStore;
//! use intake_core::domain::{EnrollmentSequencer, EnrollmentRequest};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let sequencer = EnrollmentSequencer::new(store, Arc::new(SystemTimeSource), timeout);
//! let record = sequencer.enroll(request).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use domain::{
    DispatchOutcome, Enrolled, EnrollError, EnrollmentRecord, EnrollmentRequest,
    EnrollmentSequencer, EnrollmentService, EventDispatcher, NotificationTrigger, NotifyOutcome,
    PaymentEvent, RateLimitDecision, RateLimitPolicies, RateLimitPolicy, RateLimiter, Scope,
    Secret, SignatureVerifier, StoreError, VerificationError,
};
pub use ports::{SharedStore, SystemTimeSource, TimeSource};
