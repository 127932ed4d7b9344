//! In-memory implementation of every store port.
//!
//! Each operation runs inside one mutex critical section, which makes it
//! atomic within a single process. Handler instances in other processes do
//! not see this state; use the RocksDB store for persistence.

use crate::domain::entities::{EnrollmentRecord, NewEnrollment};
use crate::domain::errors::StoreError;
use crate::domain::rate_limit::{SweepSchedule, WindowLog, WindowState};
use crate::ports::{EnrollmentStore, ProcessedEventStore, RateLimitStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    windows: HashMap<String, WindowLog>,
    by_email: HashMap<String, EnrollmentRecord>,
    /// Emails in position order; index `i` holds position `i + 1`.
    positions: Vec<String>,
    markers: HashMap<String, DateTime<Utc>>,
}

/// Mutex-guarded store for tests and single-instance deployments.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    sweep: SweepSchedule,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in position order.
    pub fn records(&self) -> Vec<EnrollmentRecord> {
        let state = self.state.lock();
        state
            .positions
            .iter()
            .filter_map(|email| state.by_email.get(email).cloned())
            .collect()
    }

    /// Number of live rate-limit windows.
    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    /// Number of processed-event markers.
    pub fn marker_count(&self) -> usize {
        self.state.lock().markers.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn hit(
        &self,
        key: &str,
        now_ms: u64,
        limit: u32,
        window: Duration,
    ) -> Result<WindowState, StoreError> {
        let mut state = self.state.lock();
        if self.sweep.due(now_ms) {
            let before = state.windows.len();
            state.windows.retain(|_, log| !log.is_idle(now_ms));
            let swept = before - state.windows.len();
            if swept > 0 {
                debug!(swept, "Expired idle rate-limit windows");
            }
        }

        let log = state.windows.entry(key.to_string()).or_default();
        let result = log.hit(now_ms, limit, window);
        if log.entries.is_empty() {
            state.windows.remove(key);
        }
        Ok(result)
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn insert_next(
        &self,
        enrollment: NewEnrollment,
        created_at: DateTime<Utc>,
    ) -> Result<EnrollmentRecord, StoreError> {
        let mut state = self.state.lock();
        if state.by_email.contains_key(enrollment.email()) {
            return Err(StoreError::Duplicate {
                key: enrollment.email().to_string(),
            });
        }

        let position = state.positions.len() as u64 + 1;
        let record = enrollment.into_record(position, created_at);
        state.positions.push(record.email.clone());
        state.by_email.insert(record.email.clone(), record.clone());
        Ok(record)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().positions.len() as u64)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<EnrollmentRecord>, StoreError> {
        Ok(self.state.lock().by_email.get(email).cloned())
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryStore {
    async fn claim(&self, event_id: &str, claimed_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        if state.markers.contains_key(event_id) {
            return Ok(false);
        }
        state.markers.insert(event_id.to_string(), claimed_at);
        Ok(true)
    }

    async fn release(&self, event_id: &str) -> Result<(), StoreError> {
        self.state.lock().markers.remove(event_id);
        Ok(())
    }

    async fn is_processed(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().markers.contains_key(event_id))
    }
}
