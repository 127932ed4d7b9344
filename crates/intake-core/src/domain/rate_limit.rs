//! # Sliding-Window Rate Limiter
//!
//! Admission control keyed by caller identity and a named [`Scope`].
//!
//! The window is an exact sliding log: the store keeps the admission instants
//! that are still inside the window, and a hit is admitted only while fewer
//! than `limit` remain. Only admitted hits are recorded, so a caller that keeps
//! hammering a full bucket does not extend its own lockout.
//!
//! ```text
//!   now - window                              now
//!        │  x      x   x        x      x       │   limit = 5, count = 5
//!        └─────────────────────────────────────┘   → denied, reset = first x + window
//! ```
//!
//! All counting happens inside [`RateLimitStore::hit`], never in process memory,
//! so every handler instance sharing the store sees the same windows.

use crate::domain::errors::StoreError;
use crate::ports::{bounded, RateLimitStore, TimeSource};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Identity used when no proxy header identifies the caller. Every such caller
/// shares one bucket.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Named admission scopes, each with its own policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// General public traffic.
    General,
    /// Expensive operations.
    Expensive,
    /// Requests that trigger an outbound message.
    Notification,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::General, Scope::Expensive, Scope::Notification];

    /// Store key prefix for this scope.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Scope::General => "api:public",
            Scope::Expensive => "api:expensive",
            Scope::Notification => "api:email",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::General => "general",
            Scope::Expensive => "expensive",
            Scope::Notification => "notification",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold and window width for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Admissions allowed per window.
    pub limit: u32,
    /// Window width.
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub const fn per_hour(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(3600))
    }
}

/// Policies for every scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicies {
    pub general: RateLimitPolicy,
    pub expensive: RateLimitPolicy,
    pub notification: RateLimitPolicy,
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            general: RateLimitPolicy::per_hour(20),
            expensive: RateLimitPolicy::per_hour(5),
            notification: RateLimitPolicy::per_hour(10),
        }
    }
}

impl RateLimitPolicies {
    pub fn for_scope(&self, scope: Scope) -> RateLimitPolicy {
        match scope {
            Scope::General => self.general,
            Scope::Expensive => self.expensive,
            Scope::Notification => self.notification,
        }
    }
}

/// Window contents after a hit, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Whether this hit was recorded.
    pub admitted: bool,
    /// Entries inside the window after the hit.
    pub count: u32,
    /// Oldest entry still inside the window, in Unix milliseconds.
    pub oldest_ms: Option<u64>,
}

/// Minimum spacing between sweeps of idle windows.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Stored form of one sliding window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLog {
    /// Width of the window the entries were recorded under.
    pub window_ms: u64,
    /// Admission instants, Unix ms, ascending.
    pub entries: Vec<u64>,
}

impl WindowLog {
    /// Apply a hit and remember the window width for later sweeps.
    pub fn hit(&mut self, now_ms: u64, limit: u32, window: Duration) -> WindowState {
        self.window_ms = window.as_millis() as u64;
        apply_hit(&mut self.entries, now_ms, limit, window)
    }

    /// True once every entry has left the window, so the key can be dropped.
    pub fn is_idle(&self, now_ms: u64) -> bool {
        self.entries
            .last()
            .map_or(true, |&newest| newest.saturating_add(self.window_ms) <= now_ms)
    }
}

/// Time-based trigger for expiring idle windows.
///
/// Keys are client-derived, so a window that is never hit again must still
/// be removed. Stores check `due` on each hit; at most one caller per
/// interval wins and runs the sweep.
#[derive(Debug)]
pub struct SweepSchedule {
    interval_ms: u64,
    next_due_ms: AtomicU64,
}

impl SweepSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            next_due_ms: AtomicU64::new(0),
        }
    }

    /// Returns `true` for exactly one caller once the interval has elapsed.
    pub fn due(&self, now_ms: u64) -> bool {
        let next = self.next_due_ms.load(Ordering::Acquire);
        now_ms >= next
            && self
                .next_due_ms
                .compare_exchange(
                    next,
                    now_ms.saturating_add(self.interval_ms),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
    }
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self::new(SWEEP_INTERVAL)
    }
}

/// Apply one hit to a sliding log of admission instants (Unix ms, ascending).
///
/// Store adapters call this inside their atomic section.
pub fn apply_hit(entries: &mut Vec<u64>, now_ms: u64, limit: u32, window: Duration) -> WindowState {
    let window_ms = window.as_millis() as u64;
    entries.retain(|&at| at.saturating_add(window_ms) > now_ms);

    let admitted = (entries.len() as u64) < u64::from(limit);
    if admitted {
        // Keep ascending order even if instances disagree slightly on time.
        let idx = entries.partition_point(|&at| at <= now_ms);
        entries.insert(idx, now_ms);
    }

    WindowState {
        admitted,
        count: entries.len() as u32,
        oldest_ms: entries.first().copied(),
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub scope: Scope,
    pub limit: u32,
    pub remaining: u32,
    /// Instant at which the next unit of capacity frees up.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Time until `reset_at`, rounded up to whole seconds.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Duration {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        Duration::from_secs(millis.div_ceil(1000))
    }
}

/// Sliding-window rate limiter over a shared [`RateLimitStore`].
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn TimeSource>,
    policies: RateLimitPolicies,
    timeout: Duration,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn TimeSource>,
        policies: RateLimitPolicies,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            policies,
            timeout,
            enabled: true,
        }
    }

    /// Turn admission control off (development only).
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn policies(&self) -> &RateLimitPolicies {
        &self.policies
    }

    pub fn clock(&self) -> &Arc<dyn TimeSource> {
        &self.clock
    }

    /// Check and record one admission for `identity` in `scope`.
    ///
    /// A store failure or timeout is returned as an error; callers must treat
    /// it as a rejection, never as an admission.
    pub async fn admit(&self, identity: &str, scope: Scope) -> Result<RateLimitDecision, StoreError> {
        let policy = self.policies.for_scope(scope);
        let now = self.clock.now();

        if !self.enabled {
            return Ok(RateLimitDecision {
                allowed: true,
                scope,
                limit: policy.limit,
                remaining: policy.limit,
                reset_at: now,
            });
        }

        let now_ms = now.timestamp_millis().max(0) as u64;
        let key = window_key(scope, identity);

        let state = bounded(
            self.timeout,
            self.store.hit(&key, now_ms, policy.limit, policy.window),
        )
        .await
        .inspect_err(|e| warn!(scope = %scope, error = %e, "Rate limit store unavailable"))?;

        let window_ms = policy.window.as_millis() as u64;
        let reset_ms = state
            .oldest_ms
            .map(|oldest| oldest.saturating_add(window_ms))
            .unwrap_or(now_ms.saturating_add(window_ms));

        let decision = RateLimitDecision {
            allowed: state.admitted,
            scope,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(state.count),
            reset_at: millis_to_datetime(reset_ms),
        };

        debug!(
            scope = %scope,
            identity = identity,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Rate limit checked"
        );

        Ok(decision)
    }
}

/// Store key for a (scope, identity) pair.
pub fn window_key(scope: Scope, identity: &str) -> String {
    format!("{}:{}", scope.key_prefix(), identity)
}

fn millis_to_datetime(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms.min(i64::MAX as u64) as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
