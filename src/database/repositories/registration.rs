//! Registration repository implementation
//!
//! Seat admission runs inside a caller-owned transaction: lock the activity
//! row, count held seats, then insert or reactivate here.

use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, Utc};
use crate::models::activity::Activity;
use crate::models::registration::{Registration, RegistrationStatus};
use crate::utils::errors::SigeaError;

#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find registration by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Registration>, SigeaError> {
        let registration = sqlx::query_as::<_, Registration>(
            "SELECT id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at FROM registrations WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(registration)
    }

    /// Find the registration for a (student, activity) pair
    pub async fn find_by_pair(&self, conn: &mut PgConnection, student_id: i64, activity_id: i64) -> Result<Option<Registration>, SigeaError> {
        let registration = sqlx::query_as::<_, Registration>(
            "SELECT id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at FROM registrations WHERE student_id = $1 AND activity_id = $2"
        )
        .bind(student_id)
        .bind(activity_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(registration)
    }

    /// Insert a fresh registration with status Registrado
    pub async fn insert(&self, conn: &mut PgConnection, student_id: i64, activity_id: i64, now: DateTime<Utc>) -> Result<Registration, SigeaError> {
        let registration = sqlx::query_as::<_, Registration>(
            r#"
            INSERT INTO registrations (student_id, activity_id, registration_date, status, attended, created_at, updated_at)
            VALUES ($1, $2, $3, 'registrado', FALSE, $3, $3)
            RETURNING id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at
            "#
        )
        .bind(student_id)
        .bind(activity_id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(registration)
    }

    /// Reuse a cancelled registration: back to Registrado with a fresh
    /// registration date and cleared confirmation data
    pub async fn reactivate(&self, conn: &mut PgConnection, id: i64, now: DateTime<Utc>) -> Result<Registration, SigeaError> {
        let registration = sqlx::query_as::<_, Registration>(
            r#"
            UPDATE registrations
            SET status = 'registrado',
                registration_date = $2,
                attended = FALSE,
                confirmation_date = NULL,
                updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(registration)
    }

    /// Seats currently held: count of Registrado rows
    pub async fn count_active_seats(&self, conn: &mut PgConnection, activity_id: i64) -> Result<i64, SigeaError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations WHERE activity_id = $1 AND status = 'registrado'"
        )
        .bind(activity_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count.0)
    }

    /// Mark a registration cancelled
    pub async fn cancel(&self, conn: &mut PgConnection, id: i64) -> Result<Registration, SigeaError> {
        let registration = sqlx::query_as::<_, Registration>(
            r#"
            UPDATE registrations
            SET status = 'cancelado', updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(registration)
    }

    /// Mark a registration confirmed by the student
    pub async fn confirm(&self, conn: &mut PgConnection, id: i64, now: DateTime<Utc>) -> Result<Registration, SigeaError> {
        let registration = sqlx::query_as::<_, Registration>(
            r#"
            UPDATE registrations
            SET status = 'confirmado', confirmation_date = $2, updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(registration)
    }

    /// Undo a confirmation: back to Registrado with confirmation data cleared
    pub async fn unconfirm(&self, conn: &mut PgConnection, id: i64) -> Result<Registration, SigeaError> {
        let registration = sqlx::query_as::<_, Registration>(
            r#"
            UPDATE registrations
            SET status = 'registrado', attended = FALSE, confirmation_date = NULL, updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(registration)
    }

    /// Write an attendance-derived outcome onto the paired registration.
    /// Returns None when the student never registered for the activity.
    pub async fn project_outcome(
        &self,
        conn: &mut PgConnection,
        student_id: i64,
        activity_id: i64,
        status: RegistrationStatus,
        attended: bool,
        confirmation_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Registration>, SigeaError> {
        let registration = sqlx::query_as::<_, Registration>(
            r#"
            UPDATE registrations
            SET status = $3, attended = $4, confirmation_date = $5, updated_at = $6
            WHERE student_id = $1 AND activity_id = $2
            RETURNING id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at
            "#
        )
        .bind(student_id)
        .bind(activity_id)
        .bind(status)
        .bind(attended)
        .bind(confirmation_date)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(registration)
    }

    /// Activities the student holds an active (Registrado/Confirmado)
    /// registration for, loaded in one query for conflict checks
    pub async fn get_student_active_activities(&self, conn: &mut PgConnection, student_id: i64) -> Result<Vec<Activity>, SigeaError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT a.id, a.event_id, a.department, a.name, a.start_dt, a.end_dt, a.duration_hours, a.activity_type, a.location, a.modality, a.max_capacity, a.public_slug, a.created_at, a.updated_at
            FROM activities a
            INNER JOIN registrations r ON a.id = r.activity_id
            WHERE r.student_id = $1 AND r.status IN ('registrado', 'confirmado')
            ORDER BY a.start_dt ASC
            "#
        )
        .bind(student_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(activities)
    }

    /// List registrations for an activity
    pub async fn list_by_activity(&self, activity_id: i64) -> Result<Vec<Registration>, SigeaError> {
        let registrations = sqlx::query_as::<_, Registration>(
            "SELECT id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at FROM registrations WHERE activity_id = $1 ORDER BY registration_date ASC"
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registrations)
    }

    /// List registrations for a student
    pub async fn list_by_student(&self, student_id: i64) -> Result<Vec<Registration>, SigeaError> {
        let registrations = sqlx::query_as::<_, Registration>(
            "SELECT id, student_id, activity_id, registration_date, status, attended, confirmation_date, created_at, updated_at FROM registrations WHERE student_id = $1 ORDER BY registration_date ASC"
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registrations)
    }

    /// Count total registrations
    pub async fn count(&self) -> Result<i64, SigeaError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
