//! Domain layer for the intake pipeline.

pub mod dispatcher;
pub mod enrollment;
pub mod entities;
pub mod errors;
pub mod events;
pub mod notification;
pub mod rate_limit;
pub mod secret;
pub mod sequencer;
pub mod signature;

pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use enrollment::{Enrolled, EnrollmentService};
pub use entities::{EnrollmentRecord, EnrollmentRequest, NewEnrollment};
pub use errors::{
    DeliveryError, DispatchError, EnrollError, EventParseError, HandlerError, RenderError,
    StoreError, ValidationError, VerificationError,
};
pub use events::{parse_event, InboundEvent, PaymentEvent};
pub use notification::{NotificationTrigger, NotifyOutcome, RenderedMessage};
pub use rate_limit::{
    RateLimitDecision, RateLimitPolicies, RateLimitPolicy, RateLimiter, Scope, SweepSchedule,
    WindowLog, WindowState, ANONYMOUS_IDENTITY,
};
pub use secret::Secret;
pub use sequencer::EnrollmentSequencer;
pub use signature::{SignatureVerifier, VerifiedPayload, DEFAULT_TOLERANCE, SIGNATURE_HEADER};
