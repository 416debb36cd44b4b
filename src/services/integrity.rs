//! Store-wide integrity audit
//!
//! Scans the store for states the engine is supposed to make unreachable:
//! credited attendances the registration does not reflect, duplicate pairs,
//! capacity overruns, score/status disagreements, misordered timestamps,
//! slug collisions, and cycles in the related-activity graph. Run by the
//! binary after migrations; any finding fails the process.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::DatabaseService;
use crate::services::related::find_cycle;
use crate::utils::errors::Result;
use crate::utils::logging::log_integrity_finding;

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub check: &'static str,
    pub detail: String,
}

impl Violation {
    fn new(check: &'static str, detail: String) -> Self {
        Self { check, detail }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub checked_at: DateTime<Utc>,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Clone)]
pub struct IntegrityService {
    database: DatabaseService,
}

impl IntegrityService {
    pub fn new(database: DatabaseService) -> Self {
        Self { database }
    }

    /// Run every scan and log each finding.
    pub async fn audit(&self) -> Result<IntegrityReport> {
        let mut violations = Vec::new();

        for (student_id, activity_id) in self.database.scan_incoherent_credits().await? {
            violations.push(Violation::new(
                "credit_coherence",
                format!(
                    "attendance for student {student_id} in activity {activity_id} is credited but the registration does not reflect it"
                ),
            ));
        }

        for (student_id, activity_id, count) in
            self.database.scan_duplicate_registrations().await?
        {
            violations.push(Violation::new(
                "duplicate_registration",
                format!("student {student_id} holds {count} registrations for activity {activity_id}"),
            ));
        }

        for (student_id, activity_id, count) in self.database.scan_duplicate_attendances().await? {
            violations.push(Violation::new(
                "duplicate_attendance",
                format!("student {student_id} holds {count} attendances for activity {activity_id}"),
            ));
        }

        for (activity_id, max_capacity, seats) in self.database.scan_capacity_breaches().await? {
            violations.push(Violation::new(
                "capacity_exceeded",
                format!("activity {activity_id} holds {seats} active seats over a capacity of {max_capacity}"),
            ));
        }

        for (id, student_id, activity_id) in self.database.scan_misordered_timestamps().await? {
            violations.push(Violation::new(
                "timestamp_order",
                format!(
                    "attendance {id} (student {student_id}, activity {activity_id}) has timestamps out of order"
                ),
            ));
        }

        for (id, student_id, activity_id, percentage, status) in
            self.database.scan_score_mismatches().await?
        {
            violations.push(Violation::new(
                "score_consistency",
                format!(
                    "attendance {id} (student {student_id}, activity {activity_id}) carries {percentage}% with status '{status}'"
                ),
            ));
        }

        for (slug, count) in self.database.scan_duplicate_slugs().await? {
            violations.push(Violation::new(
                "slug_uniqueness",
                format!("public slug '{slug}' is assigned to {count} activities"),
            ));
        }

        for (pause_id, attendance_id) in self.database.scan_stray_pauses().await? {
            violations.push(Violation::new(
                "stray_pause",
                format!("pause {pause_id} belongs to attendance {attendance_id} which never checked in"),
            ));
        }

        let mut conn = self.database.pool().acquire().await?;
        let edges = self
            .database
            .activities
            .list_all_related_links(&mut conn)
            .await?;
        drop(conn);
        if let Some(cycle) = find_cycle(&edges) {
            let path = cycle
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            violations.push(Violation::new(
                "graph_cycle",
                format!("related activities form a cycle: {path}"),
            ));
        }

        for violation in &violations {
            log_integrity_finding(violation.check, &violation.detail);
        }

        Ok(IntegrityReport {
            checked_at: Utc::now(),
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_clean() {
        let report = IntegrityReport {
            checked_at: Utc::now(),
            violations: Vec::new(),
        };
        assert!(report.is_clean());
    }

    #[test]
    fn any_violation_taints_the_report() {
        let report = IntegrityReport {
            checked_at: Utc::now(),
            violations: vec![Violation::new("credit_coherence", "example".to_string())],
        };
        assert!(!report.is_clean());
    }
}
