//! Catalog service
//!
//! Events, activities, and students. Thin CRUD plus the validation the
//! engine assumes: ordered windows, containment in the owning event, a
//! positive duration that fits the window, and capacity only where the
//! activity type enforces it. Public slugs are assigned with bounded
//! regeneration against the unique index.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::config::Settings;
use crate::database::connection::DatabasePool;
use crate::database::repositories::{ActivityRepository, EventRepository, StudentRepository};
use crate::models::activity::{Activity, ActivityType, CreateActivityRequest, UpdateActivityRequest};
use crate::models::event::{CreateEventRequest, Event, UpdateEventRequest};
use crate::models::student::{CreateStudentRequest, Student, UpdateStudentRequest};
use crate::utils::errors::{Result, SigeaError};
use crate::utils::helpers::{
    generate_public_slug, is_valid_email, normalize_control_number, normalize_whitespace,
};
use crate::utils::time::parse_timezone;

const MAX_SLUG_ATTEMPTS: usize = 5;

fn validate_schedule(
    event: &Event,
    start_dt: DateTime<Utc>,
    end_dt: DateTime<Utc>,
    duration_hours: f64,
    tz: Tz,
) -> Result<()> {
    if start_dt >= end_dt {
        return Err(SigeaError::InvalidInput(
            "activity must start before it ends".to_string(),
        ));
    }

    // Event dates are calendar days in the application timezone.
    let first_day = start_dt.with_timezone(&tz).date_naive();
    let last_day = end_dt.with_timezone(&tz).date_naive();
    if first_day < event.start_date || last_day > event.end_date {
        return Err(SigeaError::InvalidInput(format!(
            "activity window {first_day}..{last_day} falls outside event '{}' ({}..{})",
            event.name, event.start_date, event.end_date
        )));
    }

    if !duration_hours.is_finite() || duration_hours <= 0.0 {
        return Err(SigeaError::InvalidInput(
            "duration_hours must be positive".to_string(),
        ));
    }
    let scheduled = Duration::seconds((duration_hours * 3600.0).round() as i64);
    if scheduled > end_dt - start_dt {
        return Err(SigeaError::InvalidInput(format!(
            "duration of {duration_hours} hours does not fit the scheduled window"
        )));
    }

    Ok(())
}

fn validate_capacity(activity_type: ActivityType, max_capacity: Option<i32>) -> Result<()> {
    match max_capacity {
        Some(capacity) if capacity <= 0 => Err(SigeaError::InvalidInput(
            "max_capacity must be positive".to_string(),
        )),
        Some(_) if !activity_type.enforces_capacity() => Err(SigeaError::InvalidInput(format!(
            "max_capacity does not apply to {activity_type} activities"
        ))),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct ActivityService {
    event_repository: EventRepository,
    activity_repository: ActivityRepository,
    student_repository: StudentRepository,
    pool: DatabasePool,
    timezone: Tz,
}

impl ActivityService {
    pub fn new(
        event_repository: EventRepository,
        activity_repository: ActivityRepository,
        student_repository: StudentRepository,
        pool: DatabasePool,
        settings: &Settings,
    ) -> Result<Self> {
        let timezone = parse_timezone(&settings.app.timezone)?;
        Ok(Self {
            event_repository,
            activity_repository,
            student_repository,
            pool,
            timezone,
        })
    }

    async fn require_event(&self, event_id: i64) -> Result<Event> {
        self.event_repository
            .find_by_id(event_id)
            .await?
            .ok_or(SigeaError::EventNotFound { event_id })
    }

    async fn require_activity(&self, activity_id: i64) -> Result<Activity> {
        self.activity_repository
            .find_by_id(activity_id)
            .await?
            .ok_or(SigeaError::ActivityNotFound { activity_id })
    }

    pub async fn create_event(&self, mut request: CreateEventRequest) -> Result<Event> {
        request.name = normalize_whitespace(&request.name);
        if request.name.is_empty() {
            return Err(SigeaError::InvalidInput("event name is required".to_string()));
        }
        if request.start_date > request.end_date {
            return Err(SigeaError::InvalidInput(
                "event must start on or before its end date".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let event = self.event_repository.create(&mut tx, request).await?;
        tx.commit().await?;

        info!(event_id = event.id, name = %event.name, "Event created");
        Ok(event)
    }

    pub async fn update_event(&self, event_id: i64, request: UpdateEventRequest) -> Result<Event> {
        let existing = self.require_event(event_id).await?;

        let start_date = request.start_date.unwrap_or(existing.start_date);
        let end_date = request.end_date.unwrap_or(existing.end_date);
        if start_date > end_date {
            return Err(SigeaError::InvalidInput(
                "event must start on or before its end date".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let event = self.event_repository.update(&mut tx, event_id, request).await?;
        tx.commit().await?;
        Ok(event)
    }

    /// Deletes the event with everything it owns.
    pub async fn delete_event(&self, event_id: i64) -> Result<()> {
        self.require_event(event_id).await?;

        let mut tx = self.pool.begin().await?;
        self.event_repository.delete(&mut tx, event_id).await?;
        tx.commit().await?;

        info!(event_id = event_id, "Event deleted");
        Ok(())
    }

    pub async fn get_event(&self, event_id: i64) -> Result<Option<Event>> {
        self.event_repository.find_by_id(event_id).await
    }

    pub async fn list_events(&self, limit: i64, offset: i64) -> Result<Vec<Event>> {
        self.event_repository.list(limit, offset).await
    }

    pub async fn create_activity(&self, mut request: CreateActivityRequest) -> Result<Activity> {
        request.name = normalize_whitespace(&request.name);
        if request.name.is_empty() {
            return Err(SigeaError::InvalidInput(
                "activity name is required".to_string(),
            ));
        }

        let event = self.require_event(request.event_id).await?;
        validate_schedule(
            &event,
            request.start_dt,
            request.end_dt,
            request.duration_hours,
            self.timezone,
        )?;
        validate_capacity(request.activity_type, request.max_capacity)?;

        let mut tx = self.pool.begin().await?;
        let activity = self.activity_repository.create(&mut tx, request).await?;
        tx.commit().await?;

        info!(
            activity_id = activity.id,
            event_id = activity.event_id,
            name = %activity.name,
            "Activity created"
        );
        Ok(activity)
    }

    pub async fn update_activity(
        &self,
        activity_id: i64,
        request: UpdateActivityRequest,
    ) -> Result<Activity> {
        let existing = self.require_activity(activity_id).await?;
        let event = self.require_event(existing.event_id).await?;

        let start_dt = request.start_dt.unwrap_or(existing.start_dt);
        let end_dt = request.end_dt.unwrap_or(existing.end_dt);
        let duration_hours = request.duration_hours.unwrap_or(existing.duration_hours);
        let activity_type = request.activity_type.unwrap_or(existing.activity_type);
        let max_capacity = request.max_capacity.or(existing.max_capacity);

        validate_schedule(&event, start_dt, end_dt, duration_hours, self.timezone)?;
        validate_capacity(activity_type, max_capacity)?;

        let mut tx = self.pool.begin().await?;
        let activity = self
            .activity_repository
            .update(&mut tx, activity_id, request)
            .await?;
        tx.commit().await?;
        Ok(activity)
    }

    pub async fn delete_activity(&self, activity_id: i64) -> Result<()> {
        self.require_activity(activity_id).await?;

        let mut tx = self.pool.begin().await?;
        self.activity_repository.delete(&mut tx, activity_id).await?;
        tx.commit().await?;

        info!(activity_id = activity_id, "Activity deleted");
        Ok(())
    }

    pub async fn get_activity(&self, activity_id: i64) -> Result<Option<Activity>> {
        self.activity_repository.find_by_id(activity_id).await
    }

    pub async fn get_activity_by_slug(&self, slug: &str) -> Result<Option<Activity>> {
        self.activity_repository.find_by_slug(slug).await
    }

    pub async fn list_activities(&self, event_id: i64) -> Result<Vec<Activity>> {
        self.activity_repository.list_by_event(event_id).await
    }

    /// Assign a fresh public slug, regenerating on collision with the
    /// unique index. Overwrites any previous slug.
    pub async fn assign_public_slug(&self, activity_id: i64) -> Result<Activity> {
        self.require_activity(activity_id).await?;

        for _ in 0..MAX_SLUG_ATTEMPTS {
            let slug = generate_public_slug();
            let mut tx = self.pool.begin().await?;
            match self
                .activity_repository
                .set_public_slug(&mut tx, activity_id, &slug)
                .await
            {
                Ok(activity) => {
                    tx.commit().await?;
                    info!(activity_id = activity_id, slug = %slug, "Public slug assigned");
                    return Ok(activity);
                }
                Err(err) if err.is_unique_violation() => continue,
                Err(err) => return Err(err),
            }
        }

        Err(SigeaError::RetryExhausted(format!(
            "public slug assignment for activity {activity_id}"
        )))
    }

    pub async fn create_student(&self, mut request: CreateStudentRequest) -> Result<Student> {
        request.control_number = normalize_control_number(&request.control_number);
        if request.control_number.is_empty() {
            return Err(SigeaError::InvalidInput(
                "control number is required".to_string(),
            ));
        }
        request.full_name = normalize_whitespace(&request.full_name);
        if request.full_name.is_empty() {
            return Err(SigeaError::InvalidInput(
                "student full name is required".to_string(),
            ));
        }
        if let Some(email) = &request.email {
            if !is_valid_email(email) {
                return Err(SigeaError::InvalidInput(format!(
                    "'{email}' is not a valid email address"
                )));
            }
        }

        let control_number = request.control_number.clone();
        let mut tx = self.pool.begin().await?;
        match self.student_repository.create(&mut tx, request).await {
            Ok(student) => {
                tx.commit().await?;
                info!(
                    student_id = student.id,
                    control_number = %student.control_number,
                    "Student created"
                );
                Ok(student)
            }
            Err(err) if err.is_unique_violation() => Err(SigeaError::InvalidInput(format!(
                "control number '{control_number}' is already registered"
            ))),
            Err(err) => Err(err),
        }
    }

    pub async fn update_student(
        &self,
        student_id: i64,
        mut request: UpdateStudentRequest,
    ) -> Result<Student> {
        if self.student_repository.find_by_id(student_id).await?.is_none() {
            return Err(SigeaError::StudentNotFound { student_id });
        }
        if let Some(full_name) = &request.full_name {
            let normalized = normalize_whitespace(full_name);
            if normalized.is_empty() {
                return Err(SigeaError::InvalidInput(
                    "student full name is required".to_string(),
                ));
            }
            request.full_name = Some(normalized);
        }
        if let Some(email) = &request.email {
            if !is_valid_email(email) {
                return Err(SigeaError::InvalidInput(format!(
                    "'{email}' is not a valid email address"
                )));
            }
        }

        let mut tx = self.pool.begin().await?;
        let student = self
            .student_repository
            .update(&mut tx, student_id, request)
            .await?;
        tx.commit().await?;
        Ok(student)
    }

    pub async fn get_student(&self, student_id: i64) -> Result<Option<Student>> {
        self.student_repository.find_by_id(student_id).await
    }

    pub async fn get_student_by_control_number(&self, control_number: &str) -> Result<Option<Student>> {
        let normalized = normalize_control_number(control_number);
        self.student_repository.find_by_control_number(&normalized).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn sample_event() -> Event {
        Event {
            id: 1,
            name: "Semana académica".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn tz() -> Tz {
        parse_timezone("America/Mexico_City").unwrap()
    }

    #[test]
    fn schedule_must_start_before_end() {
        let event = sample_event();
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 18, 0, 0).unwrap();
        let result = validate_schedule(&event, start, start, 1.0, tz());
        assert!(result.is_err());
    }

    #[test]
    fn schedule_must_fit_event_days() {
        let event = sample_event();
        // 2025-03-08 local is one day past the event's end.
        let start = Utc.with_ymd_and_hms(2025, 3, 8, 16, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 8, 18, 0, 0).unwrap();
        let result = validate_schedule(&event, start, end, 1.0, tz());
        assert!(result.is_err());
    }

    #[test]
    fn event_days_are_read_in_local_time() {
        let event = sample_event();
        // 2025-03-08 01:00 UTC is still 2025-03-07 in Mexico City.
        let start = Utc.with_ymd_and_hms(2025, 3, 8, 1, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 8, 3, 0, 0).unwrap();
        assert!(validate_schedule(&event, start, end, 1.0, tz()).is_ok());
    }

    #[test]
    fn duration_cannot_exceed_window() {
        let event = sample_event();
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 16, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 3, 18, 0, 0).unwrap();
        assert!(validate_schedule(&event, start, end, 2.0, tz()).is_ok());
        assert!(validate_schedule(&event, start, end, 2.5, tz()).is_err());
        assert!(validate_schedule(&event, start, end, 0.0, tz()).is_err());
    }

    #[test]
    fn capacity_only_where_enforced() {
        assert!(validate_capacity(ActivityType::Taller, Some(30)).is_ok());
        assert!(validate_capacity(ActivityType::Magistral, Some(30)).is_err());
        assert!(validate_capacity(ActivityType::Magistral, None).is_ok());
        assert!(validate_capacity(ActivityType::Curso, Some(0)).is_err());
    }
}
