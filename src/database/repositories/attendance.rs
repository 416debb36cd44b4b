//! Attendance repository implementation
//!
//! Stores the factual presence rows and their pause windows. The legacy
//! pause_time/resume_time columns mirror the most recent pause so older
//! reporting queries keep working; the `attendance_pauses` list is the
//! authoritative record.

use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, Utc};
use crate::models::attendance::{Attendance, AttendanceOrigin, AttendancePause, AttendanceStatus};
use crate::utils::errors::SigeaError;

#[derive(Clone)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the attendance for a (student, activity) pair
    pub async fn find_by_pair(&self, conn: &mut PgConnection, student_id: i64, activity_id: i64) -> Result<Option<Attendance>, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            "SELECT id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at FROM attendances WHERE student_id = $1 AND activity_id = $2"
        )
        .bind(student_id)
        .bind(activity_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Create a live check-in row
    pub async fn insert_checked_in(&self, conn: &mut PgConnection, student_id: i64, activity_id: i64, now: DateTime<Utc>) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendances (student_id, activity_id, check_in, paused, percentage, status, origin, created_at, updated_at)
            VALUES ($1, $2, $3, FALSE, 0, 'parcial', 'checkin', $3, $3)
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(student_id)
        .bind(activity_id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Record a live check-in on an existing row, e.g. one created earlier
    /// by an absence mark
    pub async fn set_check_in(&self, conn: &mut PgConnection, id: i64, now: DateTime<Utc>) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendances
            SET check_in = $2, paused = FALSE, status = 'parcial', updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Create an already-credited row (manual mark, confirmation, propagation)
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_credited(
        &self,
        conn: &mut PgConnection,
        student_id: i64,
        activity_id: i64,
        check_in: Option<DateTime<Utc>>,
        check_out: Option<DateTime<Utc>>,
        percentage: f64,
        status: AttendanceStatus,
        origin: AttendanceOrigin,
    ) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendances (student_id, activity_id, check_in, check_out, paused, percentage, status, origin, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, $5, $6, $7, $8, $8)
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(student_id)
        .bind(activity_id)
        .bind(check_in)
        .bind(check_out)
        .bind(percentage)
        .bind(status)
        .bind(origin)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Set the paused flag and mirror the pause instant
    pub async fn set_paused(&self, conn: &mut PgConnection, id: i64, paused_at: DateTime<Utc>) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendances
            SET paused = TRUE, pause_time = $2, resume_time = NULL, updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(paused_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Clear the paused flag and mirror the resume instant
    pub async fn set_resumed(&self, conn: &mut PgConnection, id: i64, resumed_at: DateTime<Utc>) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendances
            SET paused = FALSE, resume_time = $2, updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(resumed_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Record the check-out instant. Always advances; an open pause is left
    /// in the list and closes at the check-out during scoring.
    pub async fn set_check_out(&self, conn: &mut PgConnection, id: i64, check_out: DateTime<Utc>) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendances
            SET check_out = $2, paused = FALSE, updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(check_out)
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Store a computed percentage and status
    pub async fn apply_score(&self, conn: &mut PgConnection, id: i64, percentage: f64, status: AttendanceStatus) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendances
            SET percentage = $2, status = $3, updated_at = $4
            WHERE id = $1
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(percentage)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Apply an operator credit: explicit timestamps replace stored ones,
    /// and the row becomes manually owned so confirmation cleanup skips it.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_manual_credit(
        &self,
        conn: &mut PgConnection,
        id: i64,
        check_in: Option<DateTime<Utc>>,
        check_out: Option<DateTime<Utc>>,
        percentage: f64,
        status: AttendanceStatus,
    ) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendances
            SET check_in = COALESCE($2, check_in),
                check_out = COALESCE($3, check_out),
                percentage = $4,
                status = $5,
                origin = 'manual',
                paused = FALSE,
                updated_at = $6
            WHERE id = $1
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(check_in)
        .bind(check_out)
        .bind(percentage)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Upgrade an uncredited row to full credit, filling missing timestamps
    /// from the propagation source. Origin is left as recorded.
    pub async fn upgrade_credit(
        &self,
        conn: &mut PgConnection,
        id: i64,
        check_in: Option<DateTime<Utc>>,
        check_out: Option<DateTime<Utc>>,
    ) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendances
            SET check_in = COALESCE(check_in, $2),
                check_out = COALESCE(check_out, $3),
                percentage = 100,
                status = 'asistio',
                paused = FALSE,
                updated_at = $4
            WHERE id = $1
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(check_in)
        .bind(check_out)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Reopen a closed attendance. The score goes stale until the next
    /// check-out recomputes it.
    pub async fn clear_check_out(&self, conn: &mut PgConnection, id: i64) -> Result<Attendance, SigeaError> {
        let attendance = sqlx::query_as::<_, Attendance>(
            r#"
            UPDATE attendances
            SET check_out = NULL, updated_at = $2
            WHERE id = $1
            RETURNING id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(attendance)
    }

    /// Delete an attendance row
    pub async fn delete(&self, conn: &mut PgConnection, id: i64) -> Result<(), SigeaError> {
        sqlx::query("DELETE FROM attendances WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Delete the pair's attendance only if it was created by the given
    /// path, reporting whether a row was removed
    pub async fn delete_by_pair_and_origin(&self, conn: &mut PgConnection, student_id: i64, activity_id: i64, origin: AttendanceOrigin) -> Result<bool, SigeaError> {
        let result = sqlx::query(
            "DELETE FROM attendances WHERE student_id = $1 AND activity_id = $2 AND origin = $3"
        )
        .bind(student_id)
        .bind(activity_id)
        .bind(origin)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Open a new pause window
    pub async fn open_pause(&self, conn: &mut PgConnection, attendance_id: i64, paused_at: DateTime<Utc>) -> Result<AttendancePause, SigeaError> {
        let pause = sqlx::query_as::<_, AttendancePause>(
            r#"
            INSERT INTO attendance_pauses (attendance_id, paused_at)
            VALUES ($1, $2)
            RETURNING id, attendance_id, paused_at, resumed_at
            "#
        )
        .bind(attendance_id)
        .bind(paused_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(pause)
    }

    /// Close the open pause window, if one exists
    pub async fn close_open_pause(&self, conn: &mut PgConnection, attendance_id: i64, resumed_at: DateTime<Utc>) -> Result<Option<AttendancePause>, SigeaError> {
        let pause = sqlx::query_as::<_, AttendancePause>(
            r#"
            UPDATE attendance_pauses
            SET resumed_at = $2
            WHERE attendance_id = $1 AND resumed_at IS NULL
            RETURNING id, attendance_id, paused_at, resumed_at
            "#
        )
        .bind(attendance_id)
        .bind(resumed_at)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(pause)
    }

    /// All pause windows for an attendance, oldest first
    pub async fn list_pauses(&self, conn: &mut PgConnection, attendance_id: i64) -> Result<Vec<AttendancePause>, SigeaError> {
        let pauses = sqlx::query_as::<_, AttendancePause>(
            "SELECT id, attendance_id, paused_at, resumed_at FROM attendance_pauses WHERE attendance_id = $1 ORDER BY paused_at ASC"
        )
        .bind(attendance_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(pauses)
    }

    /// List fully-credited attendances for an activity
    pub async fn list_credited_by_activity(&self, conn: &mut PgConnection, activity_id: i64) -> Result<Vec<Attendance>, SigeaError> {
        let attendances = sqlx::query_as::<_, Attendance>(
            "SELECT id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at FROM attendances WHERE activity_id = $1 AND status = 'asistio' ORDER BY student_id ASC"
        )
        .bind(activity_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(attendances)
    }

    /// Sum the scheduled hours of a student's fully-credited attendances
    /// within one event
    pub async fn sum_credited_hours(&self, student_id: i64, event_id: i64) -> Result<f64, SigeaError> {
        let total: (f64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(a.duration_hours), 0)
            FROM attendances att
            INNER JOIN activities a ON a.id = att.activity_id
            WHERE att.student_id = $1 AND a.event_id = $2 AND att.status = 'asistio'
            "#
        )
        .bind(student_id)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.0)
    }

    /// Credited hours per student across one event
    pub async fn event_hour_totals(&self, event_id: i64) -> Result<Vec<(i64, f64)>, SigeaError> {
        let totals: Vec<(i64, f64)> = sqlx::query_as(
            r#"
            SELECT att.student_id, COALESCE(SUM(a.duration_hours), 0)
            FROM attendances att
            INNER JOIN activities a ON a.id = att.activity_id
            WHERE a.event_id = $1 AND att.status = 'asistio'
            GROUP BY att.student_id
            ORDER BY att.student_id ASC
            "#
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }

    /// List attendances for an activity
    pub async fn list_by_activity(&self, activity_id: i64) -> Result<Vec<Attendance>, SigeaError> {
        let attendances = sqlx::query_as::<_, Attendance>(
            "SELECT id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at FROM attendances WHERE activity_id = $1 ORDER BY check_in ASC NULLS LAST"
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attendances)
    }

    /// List attendances for a student
    pub async fn list_by_student(&self, student_id: i64) -> Result<Vec<Attendance>, SigeaError> {
        let attendances = sqlx::query_as::<_, Attendance>(
            "SELECT id, student_id, activity_id, check_in, check_out, paused, pause_time, resume_time, percentage, status, origin, created_at, updated_at FROM attendances WHERE student_id = $1 ORDER BY check_in ASC NULLS LAST"
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attendances)
    }

    /// Count total attendances
    pub async fn count(&self) -> Result<i64, SigeaError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendances")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
