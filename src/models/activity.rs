//! Activity model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

use crate::utils::time::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Magistral,
    Conferencia,
    Taller,
    Curso,
    Otro,
}

impl ActivityType {
    /// Capacity limits apply to everything except Magistrals and the catch-all.
    pub fn enforces_capacity(&self) -> bool {
        matches!(self, ActivityType::Conferencia | ActivityType::Taller | ActivityType::Curso)
    }

    /// Live check-in/pause/resume tracking is a Magistral-only policy.
    pub fn supports_live_tracking(&self) -> bool {
        matches!(self, ActivityType::Magistral)
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActivityType::Magistral => "Magistral",
            ActivityType::Conferencia => "Conferencia",
            ActivityType::Taller => "Taller",
            ActivityType::Curso => "Curso",
            ActivityType::Otro => "Otro",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: i64,
    pub event_id: i64,
    pub department: Option<String>,
    pub name: String,
    pub start_dt: DateTime<Utc>,
    pub end_dt: DateTime<Utc>,
    pub duration_hours: f64,
    pub activity_type: ActivityType,
    pub location: Option<String>,
    pub modality: Option<String>,
    pub max_capacity: Option<i32>,
    pub public_slug: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// The scheduled `[start_dt, end_dt]` interval, used for conflict checks.
    pub fn schedule_window(&self) -> Window {
        Window::new(self.start_dt, self.end_dt)
    }

    /// The percentage denominator window: `[start_dt, start_dt + duration_hours]`.
    pub fn scoring_window(&self) -> Window {
        Window::new(self.start_dt, self.start_dt + self.scheduled_duration())
    }

    pub fn scheduled_duration(&self) -> Duration {
        Duration::seconds((self.duration_hours * 3600.0).round() as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivityRequest {
    pub event_id: i64,
    pub department: Option<String>,
    pub name: String,
    pub start_dt: DateTime<Utc>,
    pub end_dt: DateTime<Utc>,
    pub duration_hours: f64,
    pub activity_type: ActivityType,
    pub location: Option<String>,
    pub modality: Option<String>,
    pub max_capacity: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateActivityRequest {
    pub department: Option<String>,
    pub name: Option<String>,
    pub start_dt: Option<DateTime<Utc>>,
    pub end_dt: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub activity_type: Option<ActivityType>,
    pub location: Option<String>,
    pub modality: Option<String>,
    pub max_capacity: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_activity() -> Activity {
        Activity {
            id: 1,
            event_id: 1,
            department: None,
            name: "Conferencia magistral de apertura".to_string(),
            start_dt: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            end_dt: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            duration_hours: 1.5,
            activity_type: ActivityType::Magistral,
            location: None,
            modality: None,
            max_capacity: None,
            public_slug: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_scoring_window_uses_duration_hours() {
        let activity = sample_activity();
        let window = activity.scoring_window();
        assert_eq!(window.start, activity.start_dt);
        assert_eq!(window.end, Utc.with_ymd_and_hms(2025, 3, 1, 11, 30, 0).unwrap());
    }

    #[test]
    fn test_schedule_window_uses_end_dt() {
        let activity = sample_activity();
        let window = activity.schedule_window();
        assert_eq!(window.end, activity.end_dt);
    }

    #[test]
    fn test_capacity_policy_by_type() {
        assert!(!ActivityType::Magistral.enforces_capacity());
        assert!(ActivityType::Taller.enforces_capacity());
        assert!(ActivityType::Conferencia.enforces_capacity());
        assert!(ActivityType::Curso.enforces_capacity());
        assert!(!ActivityType::Otro.enforces_capacity());
    }

    #[test]
    fn test_live_tracking_is_magistral_only() {
        assert!(ActivityType::Magistral.supports_live_tracking());
        assert!(!ActivityType::Taller.supports_live_tracking());
    }
}
