//! Event repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::models::event::{Event, CreateEventRequest, UpdateEventRequest};
use crate::utils::errors::SigeaError;

#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(&self, conn: &mut PgConnection, request: CreateEventRequest) -> Result<Event, SigeaError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (name, start_date, end_date, active, created_at, updated_at)
            VALUES ($1, $2, $3, TRUE, $4, $4)
            RETURNING id, name, start_date, end_date, active, created_at, updated_at
            "#
        )
        .bind(request.name)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, SigeaError> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, name, start_date, end_date, active, created_at, updated_at FROM events WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Update event
    pub async fn update(&self, conn: &mut PgConnection, id: i64, request: UpdateEventRequest) -> Result<Event, SigeaError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET name = COALESCE($2, name),
                start_date = COALESCE($3, start_date),
                end_date = COALESCE($4, end_date),
                active = COALESCE($5, active),
                updated_at = $6
            WHERE id = $1
            RETURNING id, name, start_date, end_date, active, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.name)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.active)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(event)
    }

    /// Delete event and everything it owns
    pub async fn delete(&self, conn: &mut PgConnection, id: i64) -> Result<(), SigeaError> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// List events with pagination
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Event>, SigeaError> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT id, name, start_date, end_date, active, created_at, updated_at FROM events ORDER BY start_date DESC LIMIT $1 OFFSET $2"
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Count total events
    pub async fn count(&self) -> Result<i64, SigeaError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
