//! Attendance model
//!
//! Factual presence per `(student, activity)`: check-in/check-out instants,
//! pause windows, and the computed percentage and status. The lifecycle
//! state is not stored; it is derived from which timestamps are set.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::utils::errors::Result;
use crate::utils::time::parse_wire_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Asistio,
    Parcial,
    Ausente,
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttendanceStatus::Asistio => "Asistió",
            AttendanceStatus::Parcial => "Parcial",
            AttendanceStatus::Ausente => "Ausente",
        };
        write!(f, "{name}")
    }
}

/// Which mutation path created or last credited the row. Un-confirming a
/// registration must remove exactly the rows confirmation created, so
/// provenance is persisted rather than inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_origin", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceOrigin {
    Checkin,
    Confirmation,
    Manual,
    Propagation,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: i64,
    pub student_id: i64,
    pub activity_id: i64,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub paused: bool,
    pub pause_time: Option<DateTime<Utc>>,
    pub resume_time: Option<DateTime<Utc>>,
    pub percentage: f64,
    pub status: AttendanceStatus,
    pub origin: AttendanceOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One pause window. `resumed_at` stays NULL while the pause is open.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendancePause {
    pub id: i64,
    pub attendance_id: i64,
    pub paused_at: DateTime<Utc>,
    pub resumed_at: Option<DateTime<Utc>>,
}

/// Lifecycle states derived from the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceState {
    Absent,
    PartialIn,
    Paused,
    Closed,
}

impl AttendanceState {
    pub fn name(&self) -> &'static str {
        match self {
            AttendanceState::Absent => "Absent",
            AttendanceState::PartialIn => "PartialIn",
            AttendanceState::Paused => "Paused",
            AttendanceState::Closed => "Closed",
        }
    }
}

impl Attendance {
    pub fn state(&self) -> AttendanceState {
        if self.check_out.is_some() {
            AttendanceState::Closed
        } else if self.check_in.is_none() {
            AttendanceState::Absent
        } else if self.paused {
            AttendanceState::Paused
        } else {
            AttendanceState::PartialIn
        }
    }
}

/// Manual credit request. Percentage is recomputed when both timestamps are
/// present; otherwise the credit is unconditional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkPresentRequest {
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
}

impl MarkPresentRequest {
    /// Parse a request from wire timestamps. Each value must be ISO-8601
    /// with an explicit offset.
    pub fn from_wire(check_in: Option<&str>, check_out: Option<&str>) -> Result<Self> {
        Ok(Self {
            check_in: check_in.map(parse_wire_timestamp).transpose()?,
            check_out: check_out.map(parse_wire_timestamp).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_row() -> Attendance {
        Attendance {
            id: 1,
            student_id: 1,
            activity_id: 1,
            check_in: None,
            check_out: None,
            paused: false,
            pause_time: None,
            resume_time: None,
            percentage: 0.0,
            status: AttendanceStatus::Ausente,
            origin: AttendanceOrigin::Checkin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_derivation() {
        let ten = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();

        let mut row = base_row();
        assert_eq!(row.state(), AttendanceState::Absent);

        row.check_in = Some(ten);
        assert_eq!(row.state(), AttendanceState::PartialIn);

        row.paused = true;
        row.pause_time = Some(ten);
        assert_eq!(row.state(), AttendanceState::Paused);

        row.paused = false;
        row.resume_time = Some(ten);
        assert_eq!(row.state(), AttendanceState::PartialIn);

        row.check_out = Some(ten);
        assert_eq!(row.state(), AttendanceState::Closed);
    }

    #[test]
    fn test_closed_wins_over_paused() {
        let ten = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let mut row = base_row();
        row.check_in = Some(ten);
        row.paused = true;
        row.pause_time = Some(ten);
        row.check_out = Some(ten);
        assert_eq!(row.state(), AttendanceState::Closed);
    }

    #[test]
    fn test_status_display_spanish() {
        assert_eq!(AttendanceStatus::Asistio.to_string(), "Asistió");
        assert_eq!(AttendanceStatus::Parcial.to_string(), "Parcial");
        assert_eq!(AttendanceStatus::Ausente.to_string(), "Ausente");
    }

    #[test]
    fn test_mark_present_from_wire_normalizes_offsets() {
        let request = MarkPresentRequest::from_wire(
            Some("2025-03-01T10:00:00-06:00"),
            Some("2025-03-01T18:00:00Z"),
        )
        .unwrap();
        assert_eq!(
            request.check_in.unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 16, 0, 0).unwrap()
        );
        assert_eq!(
            request.check_out.unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_mark_present_from_wire_rejects_naive_timestamps() {
        assert!(MarkPresentRequest::from_wire(Some("2025-03-01T10:00:00"), None).is_err());
        assert!(MarkPresentRequest::from_wire(None, None).unwrap().check_in.is_none());
    }
}
