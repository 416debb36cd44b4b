//! Registration/attendance consistency projection
//!
//! Attendance facts are mirrored onto the matching registration so the two
//! tables never disagree: a full-credit attendance makes the registration
//! attended, removing the attendance returns it to plain Registrado, and an
//! explicit absence mark records Ausente. The registration may not exist
//! for walk-in attendances; projection is then a no-op.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::debug;

use crate::database::repositories::RegistrationRepository;
use crate::models::registration::{Registration, RegistrationStatus};
use crate::utils::errors::Result;

#[derive(Clone)]
pub struct ProjectionService {
    registration_repository: RegistrationRepository,
}

impl ProjectionService {
    pub fn new(registration_repository: RegistrationRepository) -> Self {
        Self {
            registration_repository,
        }
    }

    /// A full-credit attendance exists: registration becomes attended.
    pub async fn project_attended(
        &self,
        conn: &mut PgConnection,
        student_id: i64,
        activity_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>> {
        let projected = self
            .registration_repository
            .project_outcome(
                conn,
                student_id,
                activity_id,
                RegistrationStatus::Asistio,
                true,
                Some(now),
            )
            .await?;

        if projected.is_none() {
            debug!(
                student_id = student_id,
                activity_id = activity_id,
                "No registration to project attendance onto"
            );
        }

        Ok(projected)
    }

    /// The attendance was deleted: registration returns to Registrado.
    pub async fn project_attendance_removed(
        &self,
        conn: &mut PgConnection,
        student_id: i64,
        activity_id: i64,
    ) -> Result<Option<Registration>> {
        self.registration_repository
            .project_outcome(
                conn,
                student_id,
                activity_id,
                RegistrationStatus::Registrado,
                false,
                None,
            )
            .await
    }

    /// An operator recorded an explicit absence.
    pub async fn project_absent(
        &self,
        conn: &mut PgConnection,
        student_id: i64,
        activity_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Registration>> {
        self.registration_repository
            .project_outcome(
                conn,
                student_id,
                activity_id,
                RegistrationStatus::Ausente,
                false,
                Some(now),
            )
            .await
    }
}
