//! Attendance lifecycle service
//!
//! Drives the per-(student, activity) presence machine: live check-in,
//! pause/resume, check-out with scoring, and the manual credit operations
//! operators use for non-Magistral activities. Every mutation, its score,
//! its registration projection and its propagation to related activities
//! commit in one transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use tracing::debug;

use crate::database::connection::DatabasePool;
use crate::database::repositories::{
    ActivityRepository, AttendanceRepository, StudentRepository,
};
use crate::models::activity::Activity;
use crate::models::attendance::{
    Attendance, AttendanceOrigin, AttendanceState, AttendanceStatus, MarkPresentRequest,
};
use crate::models::registration::Registration;
use crate::models::student::Student;
use crate::services::policy::PolicyGate;
use crate::services::projection::ProjectionService;
use crate::services::related::{PropagationOutcome, RelatedActivityService};
use crate::services::scoring::{compute_score, PauseSpan, Score, ScoreInput};
use crate::utils::errors::{Result, SigeaError};
use crate::utils::logging::log_attendance_action;

#[derive(Debug, Clone, Serialize)]
pub struct CheckInOutcome {
    pub attendance: Attendance,
    pub already_checked_in: bool,
    pub propagated: Vec<PropagationOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutOutcome {
    pub attendance: Attendance,
    pub percentage: f64,
    pub status: AttendanceStatus,
    pub propagated: Vec<PropagationOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkOutcome {
    pub attendance: Attendance,
    pub registration: Option<Registration>,
    pub propagated: Vec<PropagationOutcome>,
}

#[derive(Clone)]
pub struct AttendanceService {
    attendance_repository: AttendanceRepository,
    activity_repository: ActivityRepository,
    student_repository: StudentRepository,
    related: RelatedActivityService,
    projection: ProjectionService,
    policy: PolicyGate,
    pool: DatabasePool,
}

impl AttendanceService {
    pub fn new(
        attendance_repository: AttendanceRepository,
        activity_repository: ActivityRepository,
        student_repository: StudentRepository,
        related: RelatedActivityService,
        projection: ProjectionService,
        policy: PolicyGate,
        pool: DatabasePool,
    ) -> Self {
        Self {
            attendance_repository,
            activity_repository,
            student_repository,
            related,
            projection,
            policy,
            pool,
        }
    }

    async fn require_activity(&self, activity_id: i64) -> Result<Activity> {
        self.activity_repository
            .find_by_id(activity_id)
            .await?
            .ok_or(SigeaError::ActivityNotFound { activity_id })
    }

    async fn require_student(&self, student_id: i64) -> Result<Student> {
        self.student_repository
            .find_by_id(student_id)
            .await?
            .ok_or(SigeaError::StudentNotFound { student_id })
    }

    /// Live check-in on a Magistral. Re-invocation on an already checked-in
    /// row returns it unchanged.
    pub async fn check_in(&self, student_id: i64, activity_id: i64) -> Result<CheckInOutcome> {
        let activity = self.require_activity(activity_id).await?;
        if !activity.activity_type.supports_live_tracking() {
            return Err(SigeaError::InvalidInput(format!(
                "live check-in applies to Magistral activities, not {}",
                activity.activity_type
            )));
        }
        self.require_student(student_id).await?;

        let now = Utc::now();
        match self.try_check_in(&activity, student_id, now).await {
            Ok(outcome) => Ok(outcome),
            // A concurrent check-in for the same pair won the insert; the
            // operation is idempotent, so surface the winner's row.
            Err(err) if err.is_unique_violation() => {
                let mut conn = self.pool.acquire().await?;
                let attendance = self
                    .attendance_repository
                    .find_by_pair(&mut conn, student_id, activity_id)
                    .await?
                    .ok_or(SigeaError::AttendanceNotFound {
                        student_id,
                        activity_id,
                    })?;
                Ok(CheckInOutcome {
                    attendance,
                    already_checked_in: true,
                    propagated: Vec::new(),
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn try_check_in(
        &self,
        activity: &Activity,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> Result<CheckInOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing = self
            .attendance_repository
            .find_by_pair(&mut tx, student_id, activity.id)
            .await?;

        let attendance = match existing {
            Some(attendance) if attendance.check_in.is_some() => {
                debug!(
                    student_id = student_id,
                    activity_id = activity.id,
                    "Check-in repeated, returning existing row"
                );
                return Ok(CheckInOutcome {
                    attendance,
                    already_checked_in: true,
                    propagated: Vec::new(),
                });
            }
            Some(attendance) => {
                // Row created earlier by an absence mark; the student showed
                // up after all.
                self.attendance_repository
                    .set_check_in(&mut tx, attendance.id, now)
                    .await?
            }
            None => {
                self.attendance_repository
                    .insert_checked_in(&mut tx, student_id, activity.id, now)
                    .await?
            }
        };

        let propagated = self
            .related
            .propagate(&mut tx, activity, &attendance, now)
            .await?;
        tx.commit().await?;

        log_attendance_action(student_id, activity.id, "check_in", None);
        Ok(CheckInOutcome {
            attendance,
            already_checked_in: false,
            propagated,
        })
    }

    /// Pause a running presence. Requires the `PartialIn` state.
    pub async fn pause(&self, student_id: i64, activity_id: i64) -> Result<Attendance> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let attendance = self
            .attendance_repository
            .find_by_pair(&mut tx, student_id, activity_id)
            .await?
            .ok_or(SigeaError::AttendanceNotFound {
                student_id,
                activity_id,
            })?;

        match attendance.state() {
            AttendanceState::PartialIn => {}
            other => {
                return Err(SigeaError::InvalidStateTransition {
                    from: other.name().to_string(),
                    to: AttendanceState::Paused.name().to_string(),
                })
            }
        }

        let attendance = self
            .attendance_repository
            .set_paused(&mut tx, attendance.id, now)
            .await?;
        self.attendance_repository
            .open_pause(&mut tx, attendance.id, now)
            .await?;
        tx.commit().await?;

        log_attendance_action(student_id, activity_id, "pause", None);
        Ok(attendance)
    }

    /// Resume a paused presence. Requires the `Paused` state.
    pub async fn resume(&self, student_id: i64, activity_id: i64) -> Result<Attendance> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let attendance = self
            .attendance_repository
            .find_by_pair(&mut tx, student_id, activity_id)
            .await?
            .ok_or(SigeaError::AttendanceNotFound {
                student_id,
                activity_id,
            })?;

        match attendance.state() {
            AttendanceState::Paused => {}
            other => {
                return Err(SigeaError::InvalidStateTransition {
                    from: other.name().to_string(),
                    to: AttendanceState::PartialIn.name().to_string(),
                })
            }
        }

        let attendance = self
            .attendance_repository
            .set_resumed(&mut tx, attendance.id, now)
            .await?;
        self.attendance_repository
            .close_open_pause(&mut tx, attendance.id, now)
            .await?;
        tx.commit().await?;

        log_attendance_action(student_id, activity_id, "resume", None);
        Ok(attendance)
    }

    /// Close the presence, compute the score, and project the outcome.
    /// Re-invocation advances `check_out` and recomputes.
    pub async fn check_out(&self, student_id: i64, activity_id: i64) -> Result<CheckOutOutcome> {
        let activity = self.require_activity(activity_id).await?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let attendance = self
            .attendance_repository
            .find_by_pair(&mut tx, student_id, activity_id)
            .await?
            .ok_or(SigeaError::AttendanceNotFound {
                student_id,
                activity_id,
            })?;

        if attendance.check_in.is_none() {
            return Err(SigeaError::InvalidStateTransition {
                from: AttendanceState::Absent.name().to_string(),
                to: AttendanceState::Closed.name().to_string(),
            });
        }

        let attendance = self
            .attendance_repository
            .set_check_out(&mut tx, attendance.id, now)
            .await?;
        let score = self.score_row(&mut tx, &activity, &attendance, now).await?;
        let attendance = self
            .attendance_repository
            .apply_score(&mut tx, attendance.id, score.percentage, score.status)
            .await?;

        let propagated = if score.status == AttendanceStatus::Asistio {
            self.projection
                .project_attended(&mut tx, student_id, activity_id, now)
                .await?;
            self.related
                .propagate(&mut tx, &activity, &attendance, now)
                .await?
        } else {
            Vec::new()
        };

        tx.commit().await?;

        log_attendance_action(
            student_id,
            activity_id,
            "check_out",
            Some(&format!("{:.2}% {}", score.percentage, score.status)),
        );
        Ok(CheckOutOutcome {
            attendance,
            percentage: score.percentage,
            status: score.status,
            propagated,
        })
    }

    async fn score_row(
        &self,
        conn: &mut PgConnection,
        activity: &Activity,
        attendance: &Attendance,
        as_of: DateTime<Utc>,
    ) -> Result<Score> {
        let Some(check_in) = attendance.check_in else {
            return Err(SigeaError::InvariantBreached(format!(
                "attendance {} scored without a check-in",
                attendance.id
            )));
        };

        let pauses = self
            .attendance_repository
            .list_pauses(conn, attendance.id)
            .await?;
        let spans: Vec<PauseSpan> = pauses.iter().map(PauseSpan::from).collect();

        Ok(compute_score(&ScoreInput {
            check_in,
            check_out: attendance.check_out,
            scheduled: activity.scoring_window(),
            pauses: &spans,
            as_of,
        }))
    }

    /// Manual credit. With both timestamps present (explicit or already on
    /// the row) the percentage is recomputed; otherwise the credit is
    /// unconditional full presence.
    pub async fn mark_present(
        &self,
        student_id: i64,
        activity_id: i64,
        request: MarkPresentRequest,
    ) -> Result<MarkOutcome> {
        let activity = self.require_activity(activity_id).await?;
        self.require_student(student_id).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing = self
            .attendance_repository
            .find_by_pair(&mut tx, student_id, activity_id)
            .await?;

        let (row_check_in, row_check_out) = existing
            .as_ref()
            .map(|attendance| (attendance.check_in, attendance.check_out))
            .unwrap_or((None, None));
        let effective_in = request.check_in.or(row_check_in);
        let effective_out = request.check_out.or(row_check_out);

        let score = match (effective_in, effective_out) {
            (Some(check_in), Some(check_out)) => {
                let spans: Vec<PauseSpan> = match &existing {
                    Some(attendance) => self
                        .attendance_repository
                        .list_pauses(&mut tx, attendance.id)
                        .await?
                        .iter()
                        .map(PauseSpan::from)
                        .collect(),
                    None => Vec::new(),
                };
                compute_score(&ScoreInput {
                    check_in,
                    check_out: Some(check_out),
                    scheduled: activity.scoring_window(),
                    pauses: &spans,
                    as_of: now,
                })
            }
            _ => Score {
                percentage: 100.0,
                status: AttendanceStatus::Asistio,
            },
        };

        let attendance = match existing {
            Some(attendance) => {
                self.attendance_repository
                    .apply_manual_credit(
                        &mut tx,
                        attendance.id,
                        effective_in,
                        effective_out,
                        score.percentage,
                        score.status,
                    )
                    .await?
            }
            None => {
                self.attendance_repository
                    .insert_credited(
                        &mut tx,
                        student_id,
                        activity_id,
                        effective_in,
                        effective_out,
                        score.percentage,
                        score.status,
                        AttendanceOrigin::Manual,
                    )
                    .await?
            }
        };

        let (registration, propagated) = if score.status == AttendanceStatus::Asistio {
            let registration = self
                .projection
                .project_attended(&mut tx, student_id, activity_id, now)
                .await?;
            let propagated = self
                .related
                .propagate(&mut tx, &activity, &attendance, now)
                .await?;
            (registration, propagated)
        } else {
            (None, Vec::new())
        };

        tx.commit().await?;

        log_attendance_action(
            student_id,
            activity_id,
            "mark_present",
            Some(&format!("{:.2}% {}", score.percentage, score.status)),
        );
        Ok(MarkOutcome {
            attendance,
            registration,
            propagated,
        })
    }

    /// Record an explicit absence and project it.
    pub async fn mark_absent(&self, student_id: i64, activity_id: i64) -> Result<MarkOutcome> {
        self.require_activity(activity_id).await?;
        self.require_student(student_id).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing = self
            .attendance_repository
            .find_by_pair(&mut tx, student_id, activity_id)
            .await?;

        let attendance = match existing {
            Some(attendance) => {
                self.attendance_repository
                    .apply_manual_credit(
                        &mut tx,
                        attendance.id,
                        None,
                        None,
                        0.0,
                        AttendanceStatus::Ausente,
                    )
                    .await?
            }
            None => {
                self.attendance_repository
                    .insert_credited(
                        &mut tx,
                        student_id,
                        activity_id,
                        None,
                        None,
                        0.0,
                        AttendanceStatus::Ausente,
                        AttendanceOrigin::Manual,
                    )
                    .await?
            }
        };

        let registration = self
            .projection
            .project_absent(&mut tx, student_id, activity_id, now)
            .await?;
        tx.commit().await?;

        log_attendance_action(student_id, activity_id, "mark_absent", None);
        Ok(MarkOutcome {
            attendance,
            registration,
            propagated: Vec::new(),
        })
    }

    /// Reopen a closed attendance for correction. The stored score stays
    /// until the next check-out recomputes it.
    pub async fn reopen(&self, student_id: i64, activity_id: i64) -> Result<Attendance> {
        let mut tx = self.pool.begin().await?;

        let attendance = self
            .attendance_repository
            .find_by_pair(&mut tx, student_id, activity_id)
            .await?
            .ok_or(SigeaError::AttendanceNotFound {
                student_id,
                activity_id,
            })?;

        match attendance.state() {
            AttendanceState::Closed => {}
            other => {
                return Err(SigeaError::InvalidStateTransition {
                    from: other.name().to_string(),
                    to: AttendanceState::PartialIn.name().to_string(),
                })
            }
        }

        let attendance = self
            .attendance_repository
            .clear_check_out(&mut tx, attendance.id)
            .await?;
        tx.commit().await?;

        log_attendance_action(student_id, activity_id, "reopen", None);
        Ok(attendance)
    }

    /// Delete the attendance and return the registration to Registrado.
    pub async fn remove(&self, student_id: i64, activity_id: i64) -> Result<Option<Registration>> {
        let mut tx = self.pool.begin().await?;

        let attendance = self
            .attendance_repository
            .find_by_pair(&mut tx, student_id, activity_id)
            .await?
            .ok_or(SigeaError::AttendanceNotFound {
                student_id,
                activity_id,
            })?;

        self.attendance_repository.delete(&mut tx, attendance.id).await?;
        let registration = self
            .projection
            .project_attendance_removed(&mut tx, student_id, activity_id)
            .await?;
        tx.commit().await?;

        log_attendance_action(student_id, activity_id, "remove", None);
        Ok(registration)
    }

    /// Kiosk pause: resolves the student by control number and applies the
    /// public pause window.
    pub async fn public_pause(&self, control_number: &str, activity_id: i64) -> Result<Attendance> {
        let activity = self.require_activity(activity_id).await?;
        self.policy
            .public_pause_gate(&activity, Utc::now())
            .await
            .into_result("pause")?;

        let student = self.find_student_by_control_number(control_number).await?;
        self.pause(student.id, activity_id).await
    }

    /// Kiosk resume, under the same window as pause.
    pub async fn public_resume(&self, control_number: &str, activity_id: i64) -> Result<Attendance> {
        let activity = self.require_activity(activity_id).await?;
        self.policy
            .public_pause_gate(&activity, Utc::now())
            .await
            .into_result("resume")?;

        let student = self.find_student_by_control_number(control_number).await?;
        self.resume(student.id, activity_id).await
    }

    async fn find_student_by_control_number(&self, control_number: &str) -> Result<Student> {
        let normalized = crate::utils::helpers::normalize_control_number(control_number);
        self.student_repository
            .find_by_control_number(&normalized)
            .await?
            .ok_or(SigeaError::UnknownControlNumber(normalized))
    }

    /// Current attendance row for a pair, if any.
    pub async fn get_attendance(
        &self,
        student_id: i64,
        activity_id: i64,
    ) -> Result<Option<Attendance>> {
        let mut conn = self.pool.acquire().await?;
        self.attendance_repository
            .find_by_pair(&mut conn, student_id, activity_id)
            .await
    }

    /// Pause history for a pair.
    pub async fn get_pauses(
        &self,
        student_id: i64,
        activity_id: i64,
    ) -> Result<Vec<crate::models::attendance::AttendancePause>> {
        let mut conn = self.pool.acquire().await?;
        let attendance = self
            .attendance_repository
            .find_by_pair(&mut conn, student_id, activity_id)
            .await?
            .ok_or(SigeaError::AttendanceNotFound {
                student_id,
                activity_id,
            })?;
        self.attendance_repository
            .list_pauses(&mut conn, attendance.id)
            .await
    }

    /// All attendances recorded for an activity.
    pub async fn list_for_activity(&self, activity_id: i64) -> Result<Vec<Attendance>> {
        self.attendance_repository.list_by_activity(activity_id).await
    }

    /// All attendances recorded for a student.
    pub async fn list_for_student(&self, student_id: i64) -> Result<Vec<Attendance>> {
        self.attendance_repository.list_by_student(student_id).await
    }
}
