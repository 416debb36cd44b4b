//! Complementary-credit accounting
//!
//! Aggregates credited attendance hours per student within an event and
//! compares them against the configured threshold. The tally only counts
//! attendances whose status reached full credit.

use serde::Serialize;

use crate::config::Settings;
use crate::database::repositories::{AttendanceRepository, EventRepository, StudentRepository};
use crate::utils::errors::{Result, SigeaError};

#[derive(Debug, Clone, Serialize)]
pub struct CreditStatus {
    pub student_id: i64,
    pub event_id: i64,
    pub credited_hours: f64,
    pub required_hours: f64,
    pub earned: bool,
}

impl CreditStatus {
    fn new(student_id: i64, event_id: i64, credited_hours: f64, required_hours: f64) -> Self {
        Self {
            student_id,
            event_id,
            credited_hours,
            required_hours,
            earned: credited_hours >= required_hours,
        }
    }
}

#[derive(Clone)]
pub struct CreditService {
    event_repository: EventRepository,
    student_repository: StudentRepository,
    attendance_repository: AttendanceRepository,
    settings: Settings,
}

impl CreditService {
    pub fn new(
        event_repository: EventRepository,
        student_repository: StudentRepository,
        attendance_repository: AttendanceRepository,
        settings: Settings,
    ) -> Self {
        Self {
            event_repository,
            student_repository,
            attendance_repository,
            settings,
        }
    }

    /// Hour tally for one student across an event's activities.
    pub async fn credit_status(&self, student_id: i64, event_id: i64) -> Result<CreditStatus> {
        if self.event_repository.find_by_id(event_id).await?.is_none() {
            return Err(SigeaError::EventNotFound { event_id });
        }
        if self.student_repository.find_by_id(student_id).await?.is_none() {
            return Err(SigeaError::StudentNotFound { student_id });
        }

        let hours = self
            .attendance_repository
            .sum_credited_hours(student_id, event_id)
            .await?;
        Ok(CreditStatus::new(
            student_id,
            event_id,
            hours,
            self.settings.policy.credit_threshold_hours,
        ))
    }

    /// Hour tallies for every student with credited attendance in the event.
    pub async fn event_summary(&self, event_id: i64) -> Result<Vec<CreditStatus>> {
        if self.event_repository.find_by_id(event_id).await?.is_none() {
            return Err(SigeaError::EventNotFound { event_id });
        }

        let totals = self.attendance_repository.event_hour_totals(event_id).await?;
        let required = self.settings.policy.credit_threshold_hours;
        Ok(totals
            .into_iter()
            .map(|(student_id, hours)| CreditStatus::new(student_id, event_id, hours, required))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        let status = CreditStatus::new(1, 1, 10.0, 10.0);
        assert!(status.earned);
    }

    #[test]
    fn below_threshold_is_not_earned() {
        let status = CreditStatus::new(1, 1, 9.99, 10.0);
        assert!(!status.earned);
    }
}
