//! Registration service
//!
//! Seat admission and the registration lifecycle. Admission serializes per
//! activity by locking the activity row, then checking schedule conflicts
//! and capacity before inserting; a lost insert race against the pair
//! constraint is retried once and then surfaces as a duplicate.

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use sqlx::PgConnection;
use tracing::{debug, info};

use crate::config::Settings;
use crate::database::connection::DatabasePool;
use crate::database::repositories::{
    ActivityRepository, AttendanceRepository, RegistrationRepository, StudentRepository,
};
use crate::models::activity::Activity;
use crate::models::attendance::{Attendance, AttendanceOrigin, AttendanceStatus};
use crate::models::registration::{Registration, RegistrationStatus};
use crate::models::student::{CreateStudentRequest, Student};
use crate::services::conflict::ConflictService;
use crate::services::directory::DirectoryService;
use crate::services::policy::PolicyGate;
use crate::services::projection::ProjectionService;
use crate::utils::errors::{Result, SigeaError};
use crate::utils::helpers::{generate_uuid, normalize_control_number};
use crate::utils::logging::log_registration_action;

#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    pub registration: Registration,
    pub reactivated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
    pub registration: Registration,
    pub attendance: Option<Attendance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSkip {
    pub student_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkCreateOutcome {
    pub created: Vec<Registration>,
    pub skipped: Vec<BulkSkip>,
}

#[derive(Clone)]
pub struct RegistrationService {
    registration_repository: RegistrationRepository,
    activity_repository: ActivityRepository,
    student_repository: StudentRepository,
    attendance_repository: AttendanceRepository,
    conflicts: ConflictService,
    projection: ProjectionService,
    policy: PolicyGate,
    directory: DirectoryService,
    pool: DatabasePool,
    settings: Settings,
}

impl RegistrationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registration_repository: RegistrationRepository,
        activity_repository: ActivityRepository,
        student_repository: StudentRepository,
        attendance_repository: AttendanceRepository,
        conflicts: ConflictService,
        projection: ProjectionService,
        policy: PolicyGate,
        directory: DirectoryService,
        pool: DatabasePool,
        settings: Settings,
    ) -> Self {
        Self {
            registration_repository,
            activity_repository,
            student_repository,
            attendance_repository,
            conflicts,
            projection,
            policy,
            directory,
            pool,
            settings,
        }
    }

    async fn require_student(&self, student_id: i64) -> Result<Student> {
        self.student_repository
            .find_by_id(student_id)
            .await?
            .ok_or(SigeaError::StudentNotFound { student_id })
    }

    async fn require_activity(&self, activity_id: i64) -> Result<Activity> {
        self.activity_repository
            .find_by_id(activity_id)
            .await?
            .ok_or(SigeaError::ActivityNotFound { activity_id })
    }

    /// Admit a student into an activity. Reuses a cancelled registration
    /// when one exists.
    pub async fn register(&self, student_id: i64, activity_id: i64) -> Result<RegisterOutcome> {
        self.require_student(student_id).await?;

        match self.try_register(student_id, activity_id).await {
            // Lost an insert race against the pair constraint; the second
            // attempt sees the winner's row and reports accordingly.
            Err(err) if err.is_unique_violation() => {
                debug!(
                    student_id = student_id,
                    activity_id = activity_id,
                    "Registration insert raced, retrying once"
                );
                match self.try_register(student_id, activity_id).await {
                    Err(err) if err.is_unique_violation() => Err(SigeaError::RetryExhausted(
                        format!(
                            "registration race for student {student_id} in activity {activity_id}"
                        ),
                    )),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn try_register(&self, student_id: i64, activity_id: i64) -> Result<RegisterOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let activity = self
            .activity_repository
            .lock_row(&mut tx, activity_id)
            .await?
            .ok_or(SigeaError::ActivityNotFound { activity_id })?;

        let existing = self
            .registration_repository
            .find_by_pair(&mut tx, student_id, activity_id)
            .await?;

        if let Some(registration) = &existing {
            if registration.status != RegistrationStatus::Cancelado {
                return Err(SigeaError::DuplicateRegistration {
                    student_id,
                    activity_id,
                });
            }
        }

        self.conflicts
            .ensure_no_conflict(&mut tx, student_id, &activity)
            .await?;
        self.ensure_capacity(&mut tx, &activity).await?;

        let (registration, reactivated) = match existing {
            Some(cancelled) => (
                self.registration_repository
                    .reactivate(&mut tx, cancelled.id, now)
                    .await?,
                true,
            ),
            None => (
                self.registration_repository
                    .insert(&mut tx, student_id, activity_id, now)
                    .await?,
                false,
            ),
        };

        tx.commit().await?;

        log_registration_action(
            student_id,
            activity_id,
            if reactivated { "reactivate" } else { "register" },
            None,
        );
        Ok(RegisterOutcome {
            registration,
            reactivated,
        })
    }

    /// Seats are counted while the activity row is locked, so two admissions
    /// for the last seat cannot both pass.
    async fn ensure_capacity(&self, conn: &mut PgConnection, activity: &Activity) -> Result<()> {
        if !activity.activity_type.enforces_capacity() {
            return Ok(());
        }
        let Some(max_capacity) = activity.max_capacity else {
            return Ok(());
        };

        let seats = self
            .registration_repository
            .count_active_seats(conn, activity.id)
            .await?;
        if seats >= max_capacity as i64 {
            return Err(SigeaError::CapacityFull {
                activity_id: activity.id,
                max_capacity,
            });
        }

        Ok(())
    }

    /// Kiosk self-registration by control number, inside the grace window.
    /// Unknown control numbers are resolved against the directory and fail
    /// closed when it is disabled or unreachable.
    pub async fn self_register(
        &self,
        control_number: &str,
        activity_id: i64,
    ) -> Result<RegisterOutcome> {
        let normalized = normalize_control_number(control_number);
        let pattern = Regex::new(&self.settings.app.control_number_pattern)
            .map_err(|e| SigeaError::Config(format!("invalid control number pattern: {e}")))?;
        if !pattern.is_match(&normalized) {
            return Err(SigeaError::InvalidInput(format!(
                "control number '{normalized}' is not valid"
            )));
        }

        let activity = self.require_activity(activity_id).await?;
        self.policy
            .self_register_gate(&activity, Utc::now())
            .await
            .into_result("self_register")?;

        let student = match self
            .student_repository
            .find_by_control_number(&normalized)
            .await?
        {
            Some(student) => student,
            None => self.admit_from_directory(&normalized).await?,
        };

        self.register(student.id, activity_id).await
    }

    async fn admit_from_directory(&self, control_number: &str) -> Result<Student> {
        if !self.directory.is_enabled() {
            return Err(SigeaError::UnknownControlNumber(control_number.to_string()));
        }

        let record = self.directory.resolve(control_number).await?;

        let mut tx = self.pool.begin().await?;
        let created = self
            .student_repository
            .create(
                &mut tx,
                CreateStudentRequest {
                    control_number: control_number.to_string(),
                    full_name: record.full_name,
                    career: record.career,
                    email: record.email,
                },
            )
            .await;

        match created {
            Ok(student) => {
                tx.commit().await?;
                info!(
                    student_id = student.id,
                    control_number = control_number,
                    "Student admitted from directory"
                );
                Ok(student)
            }
            // A concurrent kiosk created the same student first.
            Err(err) if err.is_unique_violation() => {
                drop(tx);
                self.student_repository
                    .find_by_control_number(control_number)
                    .await?
                    .ok_or(SigeaError::UnknownControlNumber(control_number.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// Cancel a registration that has not earned credit yet.
    pub async fn cancel(&self, registration_id: i64) -> Result<Registration> {
        let registration = self
            .registration_repository
            .find_by_id(registration_id)
            .await?
            .ok_or(SigeaError::RegistrationNotFound { registration_id })?;

        if registration.attended || registration.status == RegistrationStatus::Asistio {
            return Err(SigeaError::AlreadyAttended { registration_id });
        }

        let mut tx = self.pool.begin().await?;
        let registration = self
            .registration_repository
            .cancel(&mut tx, registration.id)
            .await?;
        tx.commit().await?;

        log_registration_action(
            registration.student_id,
            registration.activity_id,
            "cancel",
            None,
        );
        Ok(registration)
    }

    /// Public confirmation inside the confirmation window. Depending on
    /// configuration this also records the attendance itself.
    pub async fn confirm(&self, registration_id: i64) -> Result<ConfirmOutcome> {
        let registration = self
            .registration_repository
            .find_by_id(registration_id)
            .await?
            .ok_or(SigeaError::RegistrationNotFound { registration_id })?;

        if registration.status == RegistrationStatus::Cancelado {
            return Err(SigeaError::InvalidStateTransition {
                from: RegistrationStatus::Cancelado.to_string(),
                to: RegistrationStatus::Confirmado.to_string(),
            });
        }

        let activity = self.require_activity(registration.activity_id).await?;
        let now = Utc::now();
        self.policy
            .public_confirm_gate(&activity, now)
            .await
            .into_result("confirm")?;

        let mut tx = self.pool.begin().await?;
        let mut registration = self
            .registration_repository
            .confirm(&mut tx, registration.id, now)
            .await?;

        let attendance = if self.settings.features.confirmation_creates_attendance {
            let existing = self
                .attendance_repository
                .find_by_pair(&mut tx, registration.student_id, registration.activity_id)
                .await?;
            match existing {
                Some(attendance) => Some(attendance),
                None => {
                    let attendance = self
                        .attendance_repository
                        .insert_credited(
                            &mut tx,
                            registration.student_id,
                            registration.activity_id,
                            Some(now),
                            None,
                            100.0,
                            AttendanceStatus::Asistio,
                            AttendanceOrigin::Confirmation,
                        )
                        .await?;
                    if let Some(projected) = self
                        .projection
                        .project_attended(
                            &mut tx,
                            registration.student_id,
                            registration.activity_id,
                            now,
                        )
                        .await?
                    {
                        registration = projected;
                    }
                    Some(attendance)
                }
            }
        } else {
            None
        };

        tx.commit().await?;

        log_registration_action(
            registration.student_id,
            registration.activity_id,
            "confirm",
            None,
        );
        Ok(ConfirmOutcome {
            registration,
            attendance,
        })
    }

    /// Undo a public confirmation: removes the attendance the confirmation
    /// created and returns the registration to Registrado. Credit earned
    /// through any other path blocks the undo.
    pub async fn unconfirm(&self, registration_id: i64) -> Result<Registration> {
        let registration = self
            .registration_repository
            .find_by_id(registration_id)
            .await?
            .ok_or(SigeaError::RegistrationNotFound { registration_id })?;

        let mut tx = self.pool.begin().await?;

        let removed = self
            .attendance_repository
            .delete_by_pair_and_origin(
                &mut tx,
                registration.student_id,
                registration.activity_id,
                AttendanceOrigin::Confirmation,
            )
            .await?;

        if !removed {
            let remaining = self
                .attendance_repository
                .find_by_pair(&mut tx, registration.student_id, registration.activity_id)
                .await?;
            if let Some(attendance) = remaining {
                if attendance.status == AttendanceStatus::Asistio {
                    return Err(SigeaError::AlreadyAttended { registration_id });
                }
            }
        }

        let registration = self
            .registration_repository
            .unconfirm(&mut tx, registration.id)
            .await?;
        tx.commit().await?;

        log_registration_action(
            registration.student_id,
            registration.activity_id,
            "unconfirm",
            None,
        );
        Ok(registration)
    }

    /// Operator bulk registration. Capacity still applies seat by seat;
    /// schedule conflicts do not block an operator import. Skips are
    /// reported per student, never failing the batch.
    pub async fn bulk_create(
        &self,
        activity_id: i64,
        student_ids: Vec<i64>,
    ) -> Result<BulkCreateOutcome> {
        let operation_id = generate_uuid();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let activity = self
            .activity_repository
            .lock_row(&mut tx, activity_id)
            .await?
            .ok_or(SigeaError::ActivityNotFound { activity_id })?;

        let capacity_limit = activity
            .max_capacity
            .filter(|_| activity.activity_type.enforces_capacity())
            .map(|max| max as i64);
        let mut seats = match capacity_limit {
            Some(_) => {
                self.registration_repository
                    .count_active_seats(&mut tx, activity_id)
                    .await?
            }
            None => 0,
        };

        let mut outcome = BulkCreateOutcome {
            created: Vec::new(),
            skipped: Vec::new(),
        };

        for student_id in student_ids {
            if self.student_repository.find_by_id(student_id).await?.is_none() {
                outcome.skipped.push(BulkSkip {
                    student_id,
                    reason: "student_not_found".to_string(),
                });
                continue;
            }

            let existing = self
                .registration_repository
                .find_by_pair(&mut tx, student_id, activity_id)
                .await?;

            match existing {
                Some(registration) if registration.status != RegistrationStatus::Cancelado => {
                    outcome.skipped.push(BulkSkip {
                        student_id,
                        reason: "duplicate".to_string(),
                    });
                }
                Some(cancelled) => {
                    if matches!(capacity_limit, Some(limit) if seats >= limit) {
                        outcome.skipped.push(BulkSkip {
                            student_id,
                            reason: "capacity_full".to_string(),
                        });
                        continue;
                    }
                    let registration = self
                        .registration_repository
                        .reactivate(&mut tx, cancelled.id, now)
                        .await?;
                    seats += 1;
                    outcome.created.push(registration);
                }
                None => {
                    if matches!(capacity_limit, Some(limit) if seats >= limit) {
                        outcome.skipped.push(BulkSkip {
                            student_id,
                            reason: "capacity_full".to_string(),
                        });
                        continue;
                    }
                    let registration = self
                        .registration_repository
                        .insert(&mut tx, student_id, activity_id, now)
                        .await?;
                    seats += 1;
                    outcome.created.push(registration);
                }
            }
        }

        tx.commit().await?;

        info!(
            operation_id = %operation_id,
            activity_id = activity_id,
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            "Bulk registration finished"
        );
        Ok(outcome)
    }

    /// Registration by id.
    pub async fn get(&self, registration_id: i64) -> Result<Option<Registration>> {
        self.registration_repository.find_by_id(registration_id).await
    }

    /// Registrations for one activity.
    pub async fn list_for_activity(&self, activity_id: i64) -> Result<Vec<Registration>> {
        self.registration_repository.list_by_activity(activity_id).await
    }

    /// Registrations for one student.
    pub async fn list_for_student(&self, student_id: i64) -> Result<Vec<Registration>> {
        self.registration_repository.list_by_student(student_id).await
    }
}
