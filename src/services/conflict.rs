//! Schedule conflict detection
//!
//! A student may not hold two active registrations whose scheduled windows
//! share any instant. Single-day activities compare whole windows; an
//! activity spanning several local dates is compared date by date so that a
//! Monday-to-Wednesday course only collides with things on those dates and
//! at those times of day.

use chrono_tz::Tz;
use sqlx::PgConnection;
use tracing::debug;

use crate::config::Settings;
use crate::database::repositories::RegistrationRepository;
use crate::models::activity::Activity;
use crate::utils::errors::{Result, SigeaError};
use crate::utils::time::{parse_timezone, per_date_windows, span_days};

/// Describe where two schedules collide, or `None` when they are compatible.
pub fn schedule_collision(candidate: &Activity, existing: &Activity, tz: Tz) -> Option<String> {
    let candidate_window = candidate.schedule_window();
    let existing_window = existing.schedule_window();

    if span_days(&candidate_window, tz) <= 1 && span_days(&existing_window, tz) <= 1 {
        return candidate_window.intersect(&existing_window).map(|shared| {
            format!(
                "horario en conflicto de {} a {}",
                shared.start.to_rfc3339(),
                shared.end.to_rfc3339()
            )
        });
    }

    let candidate_days = per_date_windows(&candidate_window, tz);
    let existing_days = per_date_windows(&existing_window, tz);

    for (date, day_window) in &candidate_days {
        for (other_date, other_window) in &existing_days {
            if date != other_date {
                continue;
            }
            if let Some(shared) = day_window.intersect(other_window) {
                return Some(format!(
                    "horario en conflicto el {} de {} a {}",
                    date,
                    shared.start.to_rfc3339(),
                    shared.end.to_rfc3339()
                ));
            }
        }
    }

    None
}

/// Finds the first schedule conflict between a candidate activity and a
/// student's active registrations.
#[derive(Clone)]
pub struct ConflictService {
    registration_repository: RegistrationRepository,
    timezone: Tz,
}

impl ConflictService {
    pub fn new(registration_repository: RegistrationRepository, settings: &Settings) -> Result<Self> {
        let timezone = parse_timezone(&settings.app.timezone)?;
        Ok(Self {
            registration_repository,
            timezone,
        })
    }

    /// Scan the student's active registrations for a schedule collision with
    /// the candidate. The candidate's own registration never conflicts with
    /// itself, which matters when reactivating a cancelled one.
    pub async fn find_conflict(
        &self,
        conn: &mut PgConnection,
        student_id: i64,
        candidate: &Activity,
    ) -> Result<Option<(String, String)>> {
        let active = self
            .registration_repository
            .get_student_active_activities(conn, student_id)
            .await?;

        for existing in &active {
            if existing.id == candidate.id {
                continue;
            }
            if let Some(detail) = schedule_collision(candidate, existing, self.timezone) {
                debug!(
                    student_id = student_id,
                    candidate_id = candidate.id,
                    existing_id = existing.id,
                    "Schedule conflict detected"
                );
                return Ok(Some((existing.name.clone(), detail)));
            }
        }

        Ok(None)
    }

    pub async fn ensure_no_conflict(
        &self,
        conn: &mut PgConnection,
        student_id: i64,
        candidate: &Activity,
    ) -> Result<()> {
        match self.find_conflict(conn, student_id, candidate).await? {
            Some((with_activity, detail)) => Err(SigeaError::ScheduleConflict {
                with_activity,
                detail,
            }),
            None => Ok(()),
        }
    }
}
