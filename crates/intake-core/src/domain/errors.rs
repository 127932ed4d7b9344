//! # Domain Errors
//!
//! Error types for the intake pipeline.
//!
//! Each stage owns its error enum so the HTTP boundary can map them onto the
//! taxonomy without inspecting messages:
//!
//! | Error | Class | Caller sees |
//! |-------|-------|-------------|
//! | [`ValidationError`] | input-validation | 400 |
//! | [`EnrollError::Duplicate`] | conflict | 400 |
//! | [`VerificationError`] | authentication | 400 |
//! | [`EventParseError`] | input-validation | 400 |
//! | [`StoreError`] | transient-dependency | 500 |
//! | [`DispatchError`] | transient-dependency | 500 |
//! | [`DeliveryError`] / [`RenderError`] | side channel | never surfaced |

use std::time::Duration;
use thiserror::Error;

/// Failures of the shared store backing rate limits, enrollments and
/// processed-event markers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A record with this identity key already exists.
    #[error("record already exists for key {key}")]
    Duplicate { key: String },

    /// The store did not answer within the configured bound.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Transaction could not be committed after retrying lock conflicts.
    #[error("store contention: {message}")]
    Contention { message: String },

    /// Backend I/O failure.
    #[error("store I/O error: {message}")]
    Io { message: String },

    /// Stored bytes could not be decoded.
    #[error("store serialization error: {message}")]
    Serialization { message: String },
}

impl StoreError {
    pub fn io(message: impl Into<String>) -> Self {
        StoreError::Io {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        StoreError::Serialization {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::serialization(e.to_string())
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the offending input field.
    pub field: &'static str,
    /// Human-readable reason, safe to return to the caller.
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Enrollment failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrollError {
    /// One or more fields failed validation. Nothing was written.
    #[error("invalid enrollment input ({} issue(s))", .0.len())]
    Invalid(Vec<ValidationError>),

    /// The email is already enrolled. Nothing was written.
    #[error("email already enrolled")]
    Duplicate,

    /// The store failed; the transaction either fully committed or fully aborted.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EnrollError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate { .. } => EnrollError::Duplicate,
            other => EnrollError::Store(other),
        }
    }
}

/// Reasons a webhook payload was rejected. Logged server-side only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("signature header is missing")]
    MissingHeader,

    #[error("webhook signing secret is not configured")]
    SecretNotConfigured,

    #[error("signature header is malformed: {0}")]
    MalformedHeader(&'static str),

    #[error("timestamp {timestamp} outside tolerance of {tolerance_secs}s (now {now})")]
    TimestampOutOfTolerance {
        timestamp: i64,
        now: i64,
        tolerance_secs: u64,
    },

    #[error("no signature matches the expected value")]
    SignatureMismatch,
}

/// A verified payload that cannot be interpreted as an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventParseError {
    #[error("payload is not a valid event envelope: {0}")]
    Envelope(String),

    #[error("payload for event type {kind} has an invalid object: {message}")]
    Object { kind: String, message: String },
}

/// Failures while applying an authenticated event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Claiming or releasing the idempotency marker failed.
    #[error("processed-event store failed: {0}")]
    Store(#[from] StoreError),

    /// The per-type handler failed; its claim has been released.
    #[error("handler for {kind} failed: {message}")]
    Handler { kind: &'static str, message: String },
}

/// Error returned by a [`crate::ports::BillingHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// Rendering of an outbound message failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to render message: {0}")]
pub struct RenderError(pub String);

/// Outbound delivery failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery provider is not configured")]
    NotConfigured,

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("delivery provider rejected the message (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("delivery transport error: {0}")]
    Transport(String),
}
