//! Rate limiting middleware over the shared-store sliding window.
//!
//! Each protected route gets its own layer bound to one [`Scope`]. The caller
//! identity is the first `X-Forwarded-For` entry, then `X-Real-IP`, then the
//! shared `anonymous` bucket.
//!
//! A store failure or timeout rejects the request with 500; the wrapped
//! handler only runs after a positive admission.

use super::metrics::IntakeMetrics;
use crate::domain::error::{ApiError, RateLimitInfo};
use axum::{
    body::Body,
    http::{HeaderMap, Request},
    response::{IntoResponse, Response},
};
use intake_core::domain::{RateLimiter, Scope, ANONYMOUS_IDENTITY};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{error, warn};

/// Rate limit layer
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
    scope: Scope,
    metrics: Arc<IntakeMetrics>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<RateLimiter>, scope: Scope, metrics: Arc<IntakeMetrics>) -> Self {
        Self {
            limiter,
            scope,
            metrics,
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
            scope: self.scope,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Rate limit service
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
    scope: Scope,
    metrics: Arc<IntakeMetrics>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = Arc::clone(&self.limiter);
        let metrics = Arc::clone(&self.metrics);
        let scope = self.scope;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let identity = extract_identity(req.headers());

            match limiter.admit(&identity, scope).await {
                Ok(decision) if decision.allowed => inner.call(req).await,
                Ok(decision) => {
                    let info = RateLimitInfo::from_decision(&decision, limiter.clock().now());
                    warn!(
                        identity = %identity,
                        scope = %scope,
                        limit = info.limit,
                        retry_after_secs = info.retry_after_secs,
                        "Rate limit exceeded"
                    );
                    metrics.record_rate_limit_rejection();
                    Ok(ApiError::rate_limited(info).into_response())
                }
                Err(e) => {
                    error!(
                        identity = %identity,
                        scope = %scope,
                        error = %e,
                        "Rate limit check failed, rejecting request"
                    );
                    metrics.record_rate_limit_store_error();
                    Ok(ApiError::internal().into_response())
                }
            }
        })
    }
}

/// Caller identity used as the rate-limit key.
pub fn extract_identity(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(ANONYMOUS_IDENTITY)
        .to_string()
}
