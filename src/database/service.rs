//! Database service layer
//!
//! This module bundles the repositories behind one handle and provides a
//! few cross-repository conveniences. Transactional flows live in the
//! domain services; everything here is single-statement.

use crate::database::{
    DatabasePool, EventRepository, ActivityRepository, StudentRepository,
    RegistrationRepository, AttendanceRepository, SettingRepository,
};
use crate::utils::errors::SigeaError;

#[derive(Clone)]
pub struct DatabaseService {
    pub events: EventRepository,
    pub activities: ActivityRepository,
    pub students: StudentRepository,
    pub registrations: RegistrationRepository,
    pub attendances: AttendanceRepository,
    pub settings: SettingRepository,
    pool: DatabasePool,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            events: EventRepository::new(pool.clone()),
            activities: ActivityRepository::new(pool.clone()),
            students: StudentRepository::new(pool.clone()),
            registrations: RegistrationRepository::new(pool.clone()),
            attendances: AttendanceRepository::new(pool.clone()),
            settings: SettingRepository::new(pool.clone()),
            pool,
        }
    }

    /// The underlying pool, for callers that open their own transactions
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Row counts across the core tables
    pub async fn get_system_stats(&self) -> Result<serde_json::Value, SigeaError> {
        let events = self.events.count().await?;
        let activities = self.activities.count().await?;
        let students = self.students.count().await?;
        let registrations = self.registrations.count().await?;
        let attendances = self.attendances.count().await?;

        let stats = serde_json::json!({
            "events": events,
            "activities": activities,
            "students": students,
            "registrations": registrations,
            "attendances": attendances
        });

        Ok(stats)
    }

    /// Credited attendances whose paired registration does not carry the
    /// credit. Returns `(student_id, activity_id)` pairs.
    pub async fn scan_incoherent_credits(&self) -> Result<Vec<(i64, i64)>, SigeaError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT a.student_id, a.activity_id
            FROM attendances a
            INNER JOIN registrations r
                ON r.student_id = a.student_id AND r.activity_id = a.activity_id
            WHERE a.status = 'asistio'
              AND (r.attended = FALSE OR r.status <> 'asistio')
            ORDER BY a.student_id, a.activity_id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// `(student_id, activity_id, count)` for registration pairs that exist
    /// more than once. The unique index makes this unreachable; the audit
    /// counts it anyway.
    pub async fn scan_duplicate_registrations(&self) -> Result<Vec<(i64, i64, i64)>, SigeaError> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT student_id, activity_id, COUNT(*)
            FROM registrations
            GROUP BY student_id, activity_id
            HAVING COUNT(*) > 1
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Same scan over attendances.
    pub async fn scan_duplicate_attendances(&self) -> Result<Vec<(i64, i64, i64)>, SigeaError> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT student_id, activity_id, COUNT(*)
            FROM attendances
            GROUP BY student_id, activity_id
            HAVING COUNT(*) > 1
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Capacity-enforcing activities where active seats exceed the limit.
    /// Returns `(activity_id, max_capacity, seats)`.
    pub async fn scan_capacity_breaches(&self) -> Result<Vec<(i64, i32, i64)>, SigeaError> {
        let rows: Vec<(i64, i32, i64)> = sqlx::query_as(
            r#"
            SELECT a.id, a.max_capacity, COUNT(r.id)
            FROM activities a
            INNER JOIN registrations r ON r.activity_id = a.id AND r.status = 'registrado'
            WHERE a.max_capacity IS NOT NULL
              AND a.activity_type IN ('conferencia', 'taller', 'curso')
            GROUP BY a.id, a.max_capacity
            HAVING COUNT(r.id) > a.max_capacity
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Attendance rows whose timestamps are out of order. Returns
    /// `(attendance_id, student_id, activity_id)`.
    pub async fn scan_misordered_timestamps(&self) -> Result<Vec<(i64, i64, i64)>, SigeaError> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, student_id, activity_id
            FROM attendances
            WHERE (check_in IS NOT NULL AND check_out IS NOT NULL AND check_out < check_in)
               OR (check_in IS NOT NULL AND pause_time IS NOT NULL AND pause_time < check_in)
               OR (pause_time IS NOT NULL AND resume_time IS NOT NULL AND resume_time < pause_time)
               OR (resume_time IS NOT NULL AND check_out IS NOT NULL AND check_out < resume_time)
            ORDER BY id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Attendance rows whose percentage and status disagree with the scoring
    /// thresholds, or whose percentage left `[0, 100]`. An open live row
    /// (checked in, not yet out) holds `parcial` at zero until the close
    /// scores it and is not a mismatch. Returns
    /// `(attendance_id, student_id, activity_id, percentage, status)`.
    pub async fn scan_score_mismatches(&self) -> Result<Vec<(i64, i64, i64, f64, String)>, SigeaError> {
        let rows: Vec<(i64, i64, i64, f64, String)> = sqlx::query_as(
            r#"
            SELECT id, student_id, activity_id, percentage, status::text
            FROM attendances
            WHERE percentage < 0 OR percentage > 100
               OR (status = 'asistio' AND percentage < 80)
               OR (status = 'parcial' AND percentage >= 80)
               OR (status = 'parcial' AND percentage <= 0
                   AND NOT (check_in IS NOT NULL AND check_out IS NULL))
               OR (status = 'ausente' AND percentage <> 0)
            ORDER BY id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Public slugs assigned to more than one activity. The unique index
    /// makes this unreachable; the audit counts it anyway. Returns
    /// `(public_slug, count)`.
    pub async fn scan_duplicate_slugs(&self) -> Result<Vec<(String, i64)>, SigeaError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT public_slug, COUNT(*)
            FROM activities
            WHERE public_slug IS NOT NULL
            GROUP BY public_slug
            HAVING COUNT(*) > 1
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Pause spans attached to attendances that never checked in. A pause
    /// can only be entered from a checked-in row, so these are stranded
    /// history. Returns `(pause_id, attendance_id)`.
    pub async fn scan_stray_pauses(&self) -> Result<Vec<(i64, i64)>, SigeaError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.id, p.attendance_id
            FROM attendance_pauses p
            INNER JOIN attendances a ON a.id = p.attendance_id
            WHERE a.check_in IS NULL
            ORDER BY p.id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_service_creation() {
        // This would require a test database setup
        // For now, just test that the service can be created
        let pool = sqlx::PgPool::connect("postgresql://test").await;
        if let Ok(pool) = pool {
            let service = DatabaseService::new(pool);
            assert!(!service.pool().is_closed());
        }
    }
}
