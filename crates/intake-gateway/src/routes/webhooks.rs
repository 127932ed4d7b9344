//! `POST /webhooks/payment-events`
//!
//! The body is taken as raw bytes; the signature covers the exact bytes on
//! the wire, so nothing parses it before verification succeeds.

use super::AppState;
use crate::domain::error::{ApiError, ApiResult};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use bytes::Bytes;
use intake_core::domain::{parse_event, VerificationError, SIGNATURE_HEADER};
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Authenticate, parse, then dispatch at most once per event id.
pub async fn payment_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    // A header that is not valid UTF-8 is kept as present-but-malformed.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .map(|value| value.to_str().unwrap_or_default());

    let verified = match state.verifier.verify(&body, signature) {
        Ok(verified) => verified,
        Err(VerificationError::MissingHeader) => {
            warn!("Webhook rejected: missing signature header");
            state.metrics.record_webhook_rejected();
            return Err(ApiError::missing_signature());
        }
        Err(VerificationError::SecretNotConfigured) => {
            error!("Webhook rejected: signing secret is not configured");
            state.metrics.record_webhook_rejected();
            return Err(ApiError::invalid_webhook_payload());
        }
        Err(e) => {
            warn!(error = %e, "Webhook signature verification failed");
            state.metrics.record_webhook_rejected();
            return Err(ApiError::invalid_webhook_payload());
        }
    };

    let event = parse_event(verified.body).map_err(|e| {
        warn!(error = %e, "Verified webhook payload could not be parsed");
        state.metrics.record_webhook_rejected();
        ApiError::invalid_webhook_payload()
    })?;
    state.metrics.record_webhook_verified();

    match state.dispatcher.dispatch(&event).await {
        Ok(outcome) => {
            state.metrics.record_dispatch(&outcome);
            info!(
                event_id = %event.id,
                kind = event.event.kind(),
                outcome = outcome.as_str(),
                "Webhook processed"
            );
            Ok(Json(json!({ "received": true })))
        }
        Err(e) => {
            error!(event_id = %event.id, error = %e, "Webhook processing failed");
            state.metrics.record_dispatch_failure();
            Err(ApiError::webhook_failed())
        }
    }
}
