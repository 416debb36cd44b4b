//! Registration model
//!
//! A registration is a student's declared intent to attend an activity. The
//! factual presence record lives in [`crate::models::Attendance`]; the two
//! are kept in lock-step by the consistency projector.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registrado,
    Confirmado,
    Asistio,
    Ausente,
    Cancelado,
}

impl RegistrationStatus {
    /// Statuses that hold a seat and participate in conflict detection.
    pub fn is_active(&self) -> bool {
        matches!(self, RegistrationStatus::Registrado | RegistrationStatus::Confirmado)
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RegistrationStatus::Registrado => "Registrado",
            RegistrationStatus::Confirmado => "Confirmado",
            RegistrationStatus::Asistio => "Asistió",
            RegistrationStatus::Ausente => "Ausente",
            RegistrationStatus::Cancelado => "Cancelado",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: i64,
    pub student_id: i64,
    pub activity_id: i64,
    pub registration_date: DateTime<Utc>,
    pub status: RegistrationStatus,
    pub attended: bool,
    pub confirmation_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRegistrationRequest {
    pub student_id: i64,
    pub activity_id: i64,
}
