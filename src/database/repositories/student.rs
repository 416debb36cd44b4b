//! Student repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::models::student::{Student, CreateStudentRequest, UpdateStudentRequest};
use crate::utils::errors::SigeaError;

#[derive(Clone)]
pub struct StudentRepository {
    pool: PgPool,
}

impl StudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new student
    pub async fn create(&self, conn: &mut PgConnection, request: CreateStudentRequest) -> Result<Student, SigeaError> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (control_number, full_name, career, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, control_number, full_name, career, email, created_at, updated_at
            "#
        )
        .bind(request.control_number)
        .bind(request.full_name)
        .bind(request.career)
        .bind(request.email)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(student)
    }

    /// Find student by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Student>, SigeaError> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT id, control_number, full_name, career, email, created_at, updated_at FROM students WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    /// Find student by control number
    pub async fn find_by_control_number(&self, control_number: &str) -> Result<Option<Student>, SigeaError> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT id, control_number, full_name, career, email, created_at, updated_at FROM students WHERE control_number = $1"
        )
        .bind(control_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    /// Update student
    pub async fn update(&self, conn: &mut PgConnection, id: i64, request: UpdateStudentRequest) -> Result<Student, SigeaError> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            UPDATE students
            SET full_name = COALESCE($2, full_name),
                career = COALESCE($3, career),
                email = COALESCE($4, email),
                updated_at = $5
            WHERE id = $1
            RETURNING id, control_number, full_name, career, email, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.full_name)
        .bind(request.career)
        .bind(request.email)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(student)
    }

    /// Count total students
    pub async fn count(&self) -> Result<i64, SigeaError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
