//! # Enrollment Sequencer
//!
//! Validates enrollment input and hands it to the store's atomic
//! check-and-insert, which assigns the next gapless position.
//!
//! The duplicate check and the position assignment are never done here: both
//! happen inside [`EnrollmentStore::insert_next`], so concurrent enrollments
//! cannot observe the same count or both pass the duplicate check.

use crate::domain::entities::{EnrollmentRecord, EnrollmentRequest, NewEnrollment};
use crate::domain::errors::{EnrollError, StoreError};
use crate::ports::{bounded, EnrollmentStore, TimeSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

pub struct EnrollmentSequencer {
    store: Arc<dyn EnrollmentStore>,
    clock: Arc<dyn TimeSource>,
    timeout: Duration,
}

impl EnrollmentSequencer {
    pub fn new(store: Arc<dyn EnrollmentStore>, clock: Arc<dyn TimeSource>, timeout: Duration) -> Self {
        Self {
            store,
            clock,
            timeout,
        }
    }

    /// Validate and commit a new enrollment.
    pub async fn enroll(&self, request: EnrollmentRequest) -> Result<EnrollmentRecord, EnrollError> {
        let enrollment = NewEnrollment::parse(request).map_err(EnrollError::Invalid)?;
        self.enroll_validated(enrollment).await
    }

    /// Commit input that already passed validation.
    ///
    /// The store operation is not cancelled if the caller goes away: it either
    /// commits or aborts as a unit. When the timeout fires first the caller
    /// gets `StoreError::Timeout`, yet the insert may still commit afterwards,
    /// in which case a retry sees `Duplicate`. Such late outcomes are logged
    /// at `warn` with the email and position for reconciliation.
    pub async fn enroll_validated(&self, enrollment: NewEnrollment) -> Result<EnrollmentRecord, EnrollError> {
        let email = enrollment.email().to_string();
        let store = Arc::clone(&self.store);
        let created_at = self.clock.now();

        // Detach the insert so a dropped request cannot abandon it midway.
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = store.insert_next(enrollment, created_at).await;
            if let Err(unreceived) = tx.send(result) {
                report_abandoned(unreceived);
            }
        });
        let joined = bounded(self.timeout, async {
            rx.await
                .map_err(|_| StoreError::io("insert task ended without a result"))?
        })
        .await;

        match joined {
            Ok(record) => {
                info!(email = %record.email, position = record.position, "Enrollment committed");
                Ok(record)
            }
            Err(e) => {
                let err = EnrollError::from(e);
                match &err {
                    EnrollError::Duplicate => info!(email = %email, "Duplicate enrollment rejected"),
                    other => error!(email = %email, error = %other, "Enrollment store failure"),
                }
                Err(err)
            }
        }
    }

    pub async fn count(&self) -> Result<u64, EnrollError> {
        Ok(bounded(self.timeout, self.store.count()).await?)
    }
}

/// Log the outcome of an insert nobody was waiting for.
fn report_abandoned(result: Result<EnrollmentRecord, StoreError>) {
    match result {
        Ok(record) => warn!(
            email = %record.email,
            position = record.position,
            "Enrollment committed after the caller stopped waiting"
        ),
        Err(StoreError::Duplicate { .. }) => {}
        Err(e) => warn!(error = %e, "Abandoned enrollment insert failed"),
    }
}
