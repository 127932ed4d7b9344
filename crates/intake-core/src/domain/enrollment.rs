//! Enrollment as two explicit stages: commit, then notify.

use crate::domain::entities::{EnrollmentRecord, EnrollmentRequest};
use crate::domain::errors::EnrollError;
use crate::domain::notification::{NotificationTrigger, NotifyOutcome};
use crate::domain::sequencer::EnrollmentSequencer;

/// A committed enrollment and what happened to its confirmation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrolled {
    pub record: EnrollmentRecord,
    pub notification: NotifyOutcome,
}

pub struct EnrollmentService {
    sequencer: EnrollmentSequencer,
    notifier: NotificationTrigger,
}

impl EnrollmentService {
    pub fn new(sequencer: EnrollmentSequencer, notifier: NotificationTrigger) -> Self {
        Self {
            sequencer,
            notifier,
        }
    }

    pub fn sequencer(&self) -> &EnrollmentSequencer {
        &self.sequencer
    }

    /// Commit the enrollment, then run the notification stage.
    ///
    /// Only the first stage can fail the call.
    pub async fn enroll(&self, request: EnrollmentRequest) -> Result<Enrolled, EnrollError> {
        let record = self.sequencer.enroll(request).await?;
        let notification = self.notifier.notify(&record).await;
        Ok(Enrolled {
            record,
            notification,
        })
    }
}
