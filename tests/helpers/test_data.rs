//! Seed data builders for integration tests
//!
//! Events span a generous day range around today so activity windows built
//! relative to the current instant always fit.

use chrono::{DateTime, Days, Duration, Utc};
use fake::faker::name::en::Name;
use fake::Fake;
use rand::Rng;

use sigea::models::activity::{Activity, ActivityType, CreateActivityRequest};
use sigea::models::event::{CreateEventRequest, Event};
use sigea::models::setting::UpsertSettingRequest;
use sigea::models::student::{CreateStudentRequest, Student};
use sigea::services::ServiceFactory;

fn short_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Random control number matching the default accepted pattern
pub fn control_number() -> String {
    format!("C{:08}", rand::thread_rng().gen_range(10_000_000..100_000_000))
}

pub async fn seed_event(services: &ServiceFactory) -> Event {
    let today = Utc::now().date_naive();
    services
        .catalog
        .create_event(CreateEventRequest {
            name: format!("Semana Académica {}", short_id()),
            start_date: today - Days::new(7),
            end_date: today + Days::new(30),
        })
        .await
        .expect("Failed to create event")
}

pub async fn seed_student(services: &ServiceFactory) -> Student {
    services
        .catalog
        .create_student(CreateStudentRequest {
            control_number: control_number(),
            full_name: Name().fake(),
            career: Some("Ingeniería en Sistemas".to_string()),
            email: None,
        })
        .await
        .expect("Failed to create student")
}

/// Activity builder anchored to the current instant
pub struct TestActivity {
    event_id: i64,
    name: String,
    start_offset: Duration,
    window: Duration,
    duration_hours: f64,
    activity_type: ActivityType,
    max_capacity: Option<i32>,
}

impl TestActivity {
    /// A Magistral that started five minutes ago and runs two hours
    pub fn magistral(event_id: i64) -> Self {
        Self {
            event_id,
            name: format!("Magistral {}", short_id()),
            start_offset: Duration::minutes(-5),
            window: Duration::hours(2),
            duration_hours: 2.0,
            activity_type: ActivityType::Magistral,
            max_capacity: None,
        }
    }

    /// A workshop starting in one hour, optionally capacity-limited
    pub fn taller(event_id: i64, capacity: Option<i32>) -> Self {
        Self {
            event_id,
            name: format!("Taller {}", short_id()),
            start_offset: Duration::hours(1),
            window: Duration::hours(2),
            duration_hours: 2.0,
            activity_type: ActivityType::Taller,
            max_capacity: capacity,
        }
    }

    /// An open-capacity course starting in one hour
    pub fn curso(event_id: i64) -> Self {
        Self {
            event_id,
            name: format!("Curso {}", short_id()),
            start_offset: Duration::hours(1),
            window: Duration::hours(2),
            duration_hours: 2.0,
            activity_type: ActivityType::Curso,
            max_capacity: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Offset of `start_dt` from now; negative means already started
    pub fn starting_in(mut self, offset: Duration) -> Self {
        self.start_offset = offset;
        self
    }

    /// Length of the scheduled `[start_dt, end_dt]` window
    pub fn running_for(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Expected hours for the percentage denominator
    pub fn expecting_hours(mut self, hours: f64) -> Self {
        self.duration_hours = hours;
        self
    }

    pub async fn create(self, services: &ServiceFactory) -> Activity {
        let start_dt = Utc::now() + self.start_offset;
        services
            .catalog
            .create_activity(CreateActivityRequest {
                event_id: self.event_id,
                department: None,
                name: self.name,
                start_dt,
                end_dt: start_dt + self.window,
                duration_hours: self.duration_hours,
                activity_type: self.activity_type,
                location: None,
                modality: None,
                max_capacity: self.max_capacity,
            })
            .await
            .expect("Failed to create activity")
    }
}

/// Write a runtime policy override and drop the gate's cache
pub async fn set_policy_override(services: &ServiceFactory, key: &str, value: i64) {
    let mut tx = services
        .database
        .pool()
        .begin()
        .await
        .expect("Failed to begin transaction");
    services
        .database
        .settings
        .upsert(
            &mut tx,
            UpsertSettingRequest {
                key: key.to_string(),
                value: serde_json::json!(value),
                updated_by: Some("tests".to_string()),
            },
        )
        .await
        .expect("Failed to upsert setting");
    tx.commit().await.expect("Failed to commit");

    services.policy.refresh().await;
}

/// Insert a finished pause span directly, for recompute tests
pub async fn insert_pause_span(
    services: &ServiceFactory,
    attendance_id: i64,
    paused_at: DateTime<Utc>,
    resumed_at: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO attendance_pauses (attendance_id, paused_at, resumed_at) VALUES ($1, $2, $3)",
    )
    .bind(attendance_id)
    .bind(paused_at)
    .bind(resumed_at)
    .execute(services.database.pool())
    .await
    .expect("Failed to insert pause span");
}
