//! Application settings repository
//!
//! Key/JSONB policy overrides. Values stored here take precedence over the
//! static configuration file; the policy gate reads them through an
//! advisory TTL cache.

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::models::setting::{AppSetting, UpsertSettingRequest};
use crate::utils::errors::SigeaError;

#[derive(Clone)]
pub struct SettingRepository {
    pool: PgPool,
}

impl SettingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a setting by key
    pub async fn get(&self, key: &str) -> Result<Option<AppSetting>, SigeaError> {
        let setting = sqlx::query_as::<_, AppSetting>(
            "SELECT id, key, value, updated_by, updated_at FROM app_settings WHERE key = $1"
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    /// List all settings
    pub async fn list_all(&self) -> Result<Vec<AppSetting>, SigeaError> {
        let settings = sqlx::query_as::<_, AppSetting>(
            "SELECT id, key, value, updated_by, updated_at FROM app_settings ORDER BY key ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }

    /// Create or replace a setting
    pub async fn upsert(&self, conn: &mut PgConnection, request: UpsertSettingRequest) -> Result<AppSetting, SigeaError> {
        let setting = sqlx::query_as::<_, AppSetting>(
            r#"
            INSERT INTO app_settings (key, value, updated_by, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE SET value = $2, updated_by = $3, updated_at = $4
            RETURNING id, key, value, updated_by, updated_at
            "#
        )
        .bind(request.key)
        .bind(request.value)
        .bind(request.updated_by)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(setting)
    }

    /// Delete a setting, reporting whether it existed
    pub async fn delete(&self, conn: &mut PgConnection, key: &str) -> Result<bool, SigeaError> {
        let result = sqlx::query("DELETE FROM app_settings WHERE key = $1")
            .bind(key)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
