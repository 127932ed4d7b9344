//! `POST /enroll`

use super::AppState;
use crate::domain::error::{ApiError, ApiResult, FieldError};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use intake_core::domain::{EnrollError, Enrolled, EnrollmentRequest};
use serde::Serialize;
use tracing::{error, info};

pub const SUCCESS_MESSAGE: &str = "You've been added to the waitlist!";

/// Successful enrollment body
#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub success: bool,
    pub position: u64,
    pub message: &'static str,
}

/// Validate, commit, then attempt the confirmation message.
///
/// The status is decided by the commit alone; a failed confirmation still
/// returns 201.
pub async fn enroll(
    State(state): State<AppState>,
    payload: Result<Json<EnrollmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EnrollResponse>)> {
    let Json(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::payload_too_large();
        }
        state.metrics.record_enrollment_invalid();
        ApiError::invalid_input(vec![FieldError {
            field: "body".to_string(),
            message: rejection.body_text(),
        }])
    })?;

    match state.enrollment.enroll(request).await {
        Ok(Enrolled {
            record,
            notification,
        }) => {
            state.metrics.record_enrollment_created();
            state.metrics.record_notification(&notification);
            info!(
                position = record.position,
                notification = notification.as_str(),
                "Enrollment accepted"
            );
            Ok((
                StatusCode::CREATED,
                Json(EnrollResponse {
                    success: true,
                    position: record.position,
                    message: SUCCESS_MESSAGE,
                }),
            ))
        }
        Err(EnrollError::Invalid(errors)) => {
            state.metrics.record_enrollment_invalid();
            Err(ApiError::validation(&errors))
        }
        Err(EnrollError::Duplicate) => {
            state.metrics.record_enrollment_duplicate();
            Err(ApiError::duplicate_email())
        }
        Err(EnrollError::Store(e)) => {
            error!(error = %e, "Enrollment failed");
            Err(ApiError::internal())
        }
    }
}
