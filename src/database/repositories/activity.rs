//! Activity repository implementation
//!
//! Covers the activity catalog plus the `related_activities` edge relation.
//! Mutations take an explicit connection so callers control transaction
//! boundaries; admission paths lock the activity row first.

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::models::activity::{Activity, CreateActivityRequest, UpdateActivityRequest};
use crate::utils::errors::SigeaError;

#[derive(Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new activity (without a public slug; slugs are assigned separately)
    pub async fn create(&self, conn: &mut PgConnection, request: CreateActivityRequest) -> Result<Activity, SigeaError> {
        let activity = sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (event_id, department, name, start_dt, end_dt, duration_hours, activity_type, location, modality, max_capacity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING id, event_id, department, name, start_dt, end_dt, duration_hours, activity_type, location, modality, max_capacity, public_slug, created_at, updated_at
            "#
        )
        .bind(request.event_id)
        .bind(request.department)
        .bind(request.name)
        .bind(request.start_dt)
        .bind(request.end_dt)
        .bind(request.duration_hours)
        .bind(request.activity_type)
        .bind(request.location)
        .bind(request.modality)
        .bind(request.max_capacity)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(activity)
    }

    /// Find activity by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Activity>, SigeaError> {
        let activity = sqlx::query_as::<_, Activity>(
            "SELECT id, event_id, department, name, start_dt, end_dt, duration_hours, activity_type, location, modality, max_capacity, public_slug, created_at, updated_at FROM activities WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(activity)
    }

    /// Find activity by its opaque public slug
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Activity>, SigeaError> {
        let activity = sqlx::query_as::<_, Activity>(
            "SELECT id, event_id, department, name, start_dt, end_dt, duration_hours, activity_type, location, modality, max_capacity, public_slug, created_at, updated_at FROM activities WHERE public_slug = $1"
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(activity)
    }

    /// Load the activity row under a write-intent lock. Capacity admission
    /// and link mutations both serialize through this.
    pub async fn lock_row(&self, conn: &mut PgConnection, id: i64) -> Result<Option<Activity>, SigeaError> {
        let activity = sqlx::query_as::<_, Activity>(
            "SELECT id, event_id, department, name, start_dt, end_dt, duration_hours, activity_type, location, modality, max_capacity, public_slug, created_at, updated_at FROM activities WHERE id = $1 FOR UPDATE"
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(activity)
    }

    /// Update activity
    pub async fn update(&self, conn: &mut PgConnection, id: i64, request: UpdateActivityRequest) -> Result<Activity, SigeaError> {
        let activity = sqlx::query_as::<_, Activity>(
            r#"
            UPDATE activities
            SET department = COALESCE($2, department),
                name = COALESCE($3, name),
                start_dt = COALESCE($4, start_dt),
                end_dt = COALESCE($5, end_dt),
                duration_hours = COALESCE($6, duration_hours),
                activity_type = COALESCE($7, activity_type),
                location = COALESCE($8, location),
                modality = COALESCE($9, modality),
                max_capacity = COALESCE($10, max_capacity),
                updated_at = $11
            WHERE id = $1
            RETURNING id, event_id, department, name, start_dt, end_dt, duration_hours, activity_type, location, modality, max_capacity, public_slug, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.department)
        .bind(request.name)
        .bind(request.start_dt)
        .bind(request.end_dt)
        .bind(request.duration_hours)
        .bind(request.activity_type)
        .bind(request.location)
        .bind(request.modality)
        .bind(request.max_capacity)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(activity)
    }

    /// Assign a public slug; the unique index rejects collisions
    pub async fn set_public_slug(&self, conn: &mut PgConnection, id: i64, slug: &str) -> Result<Activity, SigeaError> {
        let activity = sqlx::query_as::<_, Activity>(
            r#"
            UPDATE activities
            SET public_slug = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, event_id, department, name, start_dt, end_dt, duration_hours, activity_type, location, modality, max_capacity, public_slug, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(slug)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(activity)
    }

    /// Delete activity
    pub async fn delete(&self, conn: &mut PgConnection, id: i64) -> Result<(), SigeaError> {
        sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// List activities belonging to an event
    pub async fn list_by_event(&self, event_id: i64) -> Result<Vec<Activity>, SigeaError> {
        let activities = sqlx::query_as::<_, Activity>(
            "SELECT id, event_id, department, name, start_dt, end_dt, duration_hours, activity_type, location, modality, max_capacity, public_slug, created_at, updated_at FROM activities WHERE event_id = $1 ORDER BY start_dt ASC"
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }

    /// Add a related-activity edge. The primary key rejects duplicates and
    /// the check constraint rejects self-links; cycle checks happen above.
    pub async fn add_related_link(&self, conn: &mut PgConnection, activity_id: i64, related_id: i64) -> Result<(), SigeaError> {
        sqlx::query(
            "INSERT INTO related_activities (activity_id, related_activity_id, created_at) VALUES ($1, $2, $3)"
        )
        .bind(activity_id)
        .bind(related_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Remove a related-activity edge, reporting whether it existed
    pub async fn remove_related_link(&self, conn: &mut PgConnection, activity_id: i64, related_id: i64) -> Result<bool, SigeaError> {
        let result = sqlx::query(
            "DELETE FROM related_activities WHERE activity_id = $1 AND related_activity_id = $2"
        )
        .bind(activity_id)
        .bind(related_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Activities credited by the given one, loaded eagerly in one query
    pub async fn get_related_activities(&self, conn: &mut PgConnection, activity_id: i64) -> Result<Vec<Activity>, SigeaError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT a.id, a.event_id, a.department, a.name, a.start_dt, a.end_dt, a.duration_hours, a.activity_type, a.location, a.modality, a.max_capacity, a.public_slug, a.created_at, a.updated_at
            FROM activities a
            INNER JOIN related_activities r ON a.id = r.related_activity_id
            WHERE r.activity_id = $1
            ORDER BY a.start_dt ASC
            "#
        )
        .bind(activity_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(activities)
    }

    /// Number of outgoing related-activity edges
    pub async fn count_outgoing_links(&self, conn: &mut PgConnection, activity_id: i64) -> Result<i64, SigeaError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM related_activities WHERE activity_id = $1"
        )
        .bind(activity_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count.0)
    }

    /// Whether a specific edge exists
    pub async fn related_link_exists(&self, conn: &mut PgConnection, activity_id: i64, related_id: i64) -> Result<bool, SigeaError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM related_activities WHERE activity_id = $1 AND related_activity_id = $2"
        )
        .bind(activity_id)
        .bind(related_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count.0 > 0)
    }

    /// The whole edge relation, for reachability checks and audits
    pub async fn list_all_related_links(&self, conn: &mut PgConnection) -> Result<Vec<(i64, i64)>, SigeaError> {
        let edges: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT activity_id, related_activity_id FROM related_activities"
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(edges)
    }

    /// Count total activities
    pub async fn count(&self) -> Result<i64, SigeaError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activities")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
