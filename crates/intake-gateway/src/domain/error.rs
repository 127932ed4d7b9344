//! HTTP error responses for the intake gateway.
//!
//! Client-facing messages are fixed strings from [`messages`]; internal
//! detail is logged where the error is produced and never returned.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use intake_core::domain::{RateLimitDecision, ValidationError};
use serde::Serialize;
use std::fmt;

/// Public error messages
pub mod messages {
    pub const SERVER_ERROR: &str = "An unexpected error occurred";
    pub const INVALID_INPUT: &str = "Invalid input";
    pub const DUPLICATE_EMAIL: &str = "Email already on waitlist";
    pub const MISSING_SIGNATURE: &str = "Missing Stripe signature";
    pub const INVALID_WEBHOOK_PAYLOAD: &str = "Invalid webhook payload";
    pub const WEBHOOK_PROCESSING_FAILED: &str = "Failed to process webhook";
    pub const RATE_LIMIT_EXCEEDED: &str = "Too many requests. Please try again later.";
    pub const PAYLOAD_TOO_LARGE: &str = "Request body too large";
}

/// Header names attached to rate-limited responses
pub mod headers {
    pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
    pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
    pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
}

/// One rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl From<&ValidationError> for FieldError {
    fn from(e: &ValidationError) -> Self {
        Self {
            field: e.field.to_string(),
            message: e.message.clone(),
        }
    }
}

/// Rate-limit metadata returned with a 429
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Window reset, Unix milliseconds
    pub reset_ms: i64,
    /// Seconds until the caller may retry
    pub retry_after_secs: u64,
}

impl RateLimitInfo {
    pub fn from_decision(decision: &RateLimitDecision, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_ms: decision.reset_at.timestamp_millis(),
            retry_after_secs: decision.retry_after(now).as_secs(),
        }
    }
}

/// Gateway error with HTTP status
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code
    pub status: StatusCode,
    /// Error message, safe to return to the caller
    pub message: &'static str,
    /// Field errors for validation failures
    pub errors: Option<Vec<FieldError>>,
    /// Rate-limit metadata for 429 responses
    pub rate_limit: Option<RateLimitInfo>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, message: &'static str) -> Self {
        Self {
            status,
            message,
            errors: None,
            rate_limit: None,
        }
    }

    /// Validation failure or malformed JSON
    pub fn invalid_input(errors: Vec<FieldError>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::new(StatusCode::BAD_REQUEST, messages::INVALID_INPUT)
        }
    }

    /// Validation failure from domain errors
    pub fn validation(errors: &[ValidationError]) -> Self {
        Self::invalid_input(errors.iter().map(FieldError::from).collect())
    }

    /// Email already enrolled
    pub fn duplicate_email() -> Self {
        Self::new(StatusCode::BAD_REQUEST, messages::DUPLICATE_EMAIL)
    }

    /// Webhook without a signature header
    pub fn missing_signature() -> Self {
        Self::new(StatusCode::BAD_REQUEST, messages::MISSING_SIGNATURE)
    }

    /// Webhook that failed verification or parsing
    pub fn invalid_webhook_payload() -> Self {
        Self::new(StatusCode::BAD_REQUEST, messages::INVALID_WEBHOOK_PAYLOAD)
    }

    /// Authenticated webhook whose dispatch failed
    pub fn webhook_failed() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            messages::WEBHOOK_PROCESSING_FAILED,
        )
    }

    /// Admission denied
    pub fn rate_limited(info: RateLimitInfo) -> Self {
        Self {
            rate_limit: Some(info),
            ..Self::new(StatusCode::TOO_MANY_REQUESTS, messages::RATE_LIMIT_EXCEEDED)
        }
    }

    /// Body over the configured size limit
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, messages::PAYLOAD_TOO_LARGE)
    }

    /// Internal error
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, messages::SERVER_ERROR)
    }

    fn body(&self) -> serde_json::Value {
        match &self.errors {
            Some(errors) => serde_json::json!({
                "message": self.message,
                "errors": errors,
            }),
            None => serde_json::json!({ "error": self.message }),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body())).into_response();

        if let Some(info) = self.rate_limit {
            let map = response.headers_mut();
            map.insert(headers::RATE_LIMIT_LIMIT, HeaderValue::from(info.limit));
            map.insert(headers::RATE_LIMIT_REMAINING, HeaderValue::from(info.remaining));
            map.insert(headers::RATE_LIMIT_RESET, HeaderValue::from(info.reset_ms));
            map.insert(header::RETRY_AFTER, HeaderValue::from(info.retry_after_secs));
        }

        response
    }
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway-level errors (startup and lifecycle)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Store could not be opened
    #[error("store error: {0}")]
    Store(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
