//! Related-activity links and credit propagation
//!
//! `related_activities` is a directed graph: an edge A -> B means crediting
//! A also credits B. Edges are validated before insertion so the graph
//! stays acyclic; traversal is a single hop over the source's outgoing
//! edges. Concurrent link mutations serialize by locking both endpoint
//! rows in ascending id order.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::{debug, info};

use crate::database::connection::DatabasePool;
use crate::database::repositories::{ActivityRepository, AttendanceRepository};
use crate::models::activity::Activity;
use crate::models::attendance::{Attendance, AttendanceOrigin, AttendanceStatus};
use crate::services::projection::ProjectionService;
use crate::utils::errors::{LinkRejection, Result, SigeaError};
use crate::utils::helpers::generate_uuid;
use crate::utils::logging::log_propagation;

/// Whether `from` can reach `to` following the directed edges.
pub fn reaches(edges: &[(i64, i64)], from: i64, to: i64) -> bool {
    let mut adjacency: HashMap<i64, Vec<i64>> = HashMap::new();
    for (source, target) in edges {
        adjacency.entry(*source).or_default().push(*target);
    }

    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        if let Some(next) = adjacency.get(&node) {
            stack.extend(next.iter().copied());
        }
    }

    false
}

/// Find one cycle in the edge set, as the node path closing back on its
/// first element. Iterative so pathological graphs cannot blow the stack.
pub fn find_cycle(edges: &[(i64, i64)]) -> Option<Vec<i64>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        White,
        Gray,
        Black,
    }

    let mut adjacency: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut nodes: Vec<i64> = Vec::new();
    for (source, target) in edges {
        adjacency.entry(*source).or_default().push(*target);
        nodes.push(*source);
        nodes.push(*target);
    }
    nodes.sort_unstable();
    nodes.dedup();

    let mut marks: HashMap<i64, Mark> = nodes.iter().map(|n| (*n, Mark::White)).collect();

    for &root in &nodes {
        if marks.get(&root) != Some(&Mark::White) {
            continue;
        }

        let mut stack: Vec<(i64, usize)> = vec![(root, 0)];
        let mut path: Vec<i64> = vec![root];
        marks.insert(root, Mark::Gray);

        while let Some(&(node, edge_index)) = stack.last() {
            let next = adjacency
                .get(&node)
                .and_then(|targets| targets.get(edge_index))
                .copied();

            match next {
                Some(target) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    match marks.get(&target).copied().unwrap_or(Mark::White) {
                        Mark::Gray => {
                            let start = path.iter().position(|&n| n == target).unwrap_or(0);
                            let mut cycle = path[start..].to_vec();
                            cycle.push(target);
                            return Some(cycle);
                        }
                        Mark::White => {
                            marks.insert(target, Mark::Gray);
                            stack.push((target, 0));
                            path.push(target);
                        }
                        Mark::Black => {}
                    }
                }
                None => {
                    marks.insert(node, Mark::Black);
                    stack.pop();
                    path.pop();
                }
            }
        }
    }

    None
}

/// What the propagator did for one target activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationAction {
    Created,
    Upgraded,
    AlreadyCredited,
}

impl PropagationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationAction::Created => "created",
            PropagationAction::Upgraded => "upgraded",
            PropagationAction::AlreadyCredited => "already_credited",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropagationOutcome {
    pub target_activity_id: i64,
    pub target_name: String,
    pub action: PropagationAction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncRelatedRequest {
    pub student_ids: Option<Vec<i64>>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncDetail {
    pub student_id: i64,
    pub target_activity_id: i64,
    pub action: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub created: usize,
    pub skipped: usize,
    pub details: Vec<SyncDetail>,
}

#[derive(Clone)]
pub struct RelatedActivityService {
    activity_repository: ActivityRepository,
    attendance_repository: AttendanceRepository,
    projection: ProjectionService,
    pool: DatabasePool,
}

impl RelatedActivityService {
    pub fn new(
        activity_repository: ActivityRepository,
        attendance_repository: AttendanceRepository,
        projection: ProjectionService,
        pool: DatabasePool,
    ) -> Self {
        Self {
            activity_repository,
            attendance_repository,
            projection,
            pool,
        }
    }

    /// Create the edge `activity -> related` after validating it keeps the
    /// graph sound.
    pub async fn add_link(&self, activity_id: i64, related_id: i64) -> Result<()> {
        if activity_id == related_id {
            return Err(SigeaError::InvalidLink(LinkRejection::SelfLink));
        }

        let mut tx = self.pool.begin().await?;

        // Lock both endpoints in id order; concurrent mutations touching a
        // shared endpoint serialize here.
        let (first, second) = if activity_id < related_id {
            (activity_id, related_id)
        } else {
            (related_id, activity_id)
        };
        let first_row = self
            .activity_repository
            .lock_row(&mut tx, first)
            .await?
            .ok_or(SigeaError::ActivityNotFound { activity_id: first })?;
        let second_row = self
            .activity_repository
            .lock_row(&mut tx, second)
            .await?
            .ok_or(SigeaError::ActivityNotFound { activity_id: second })?;

        let (source, target) = if first_row.id == activity_id {
            (&first_row, &second_row)
        } else {
            (&second_row, &first_row)
        };

        if source.event_id != target.event_id {
            return Err(SigeaError::InvalidLink(LinkRejection::CrossEvent));
        }

        if self
            .activity_repository
            .related_link_exists(&mut tx, activity_id, related_id)
            .await?
        {
            return Err(SigeaError::InvalidLink(LinkRejection::Duplicate));
        }

        // A target that itself credits other activities would make chains;
        // traversal is a single hop, so those edges are rejected up front.
        if self
            .activity_repository
            .count_outgoing_links(&mut tx, related_id)
            .await?
            > 0
        {
            return Err(SigeaError::InvalidLink(LinkRejection::OutgoingExists));
        }

        let edges = self.activity_repository.list_all_related_links(&mut tx).await?;
        if reaches(&edges, related_id, activity_id) {
            return Err(SigeaError::InvalidLink(LinkRejection::WouldCycle));
        }

        self.activity_repository
            .add_related_link(&mut tx, activity_id, related_id)
            .await?;
        tx.commit().await?;

        info!(
            activity_id = activity_id,
            related_id = related_id,
            "Related-activity link created"
        );
        Ok(())
    }

    /// Remove the edge, reporting whether it existed.
    pub async fn remove_link(&self, activity_id: i64, related_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = self
            .activity_repository
            .remove_related_link(&mut tx, activity_id, related_id)
            .await?;
        tx.commit().await?;

        if removed {
            info!(
                activity_id = activity_id,
                related_id = related_id,
                "Related-activity link removed"
            );
        }
        Ok(removed)
    }

    /// Activities credited alongside the given one.
    pub async fn list_related(&self, activity_id: i64) -> Result<Vec<Activity>> {
        let mut conn = self.pool.acquire().await?;
        self.activity_repository
            .get_related_activities(&mut conn, activity_id)
            .await
    }

    /// Credit one target for one student, mirroring the source attendance.
    async fn credit_target(
        &self,
        conn: &mut PgConnection,
        source_attendance: &Attendance,
        target: &Activity,
        now: DateTime<Utc>,
    ) -> Result<PropagationAction> {
        let student_id = source_attendance.student_id;
        let existing = self
            .attendance_repository
            .find_by_pair(conn, student_id, target.id)
            .await?;

        let action = match existing {
            None => {
                self.attendance_repository
                    .insert_credited(
                        conn,
                        student_id,
                        target.id,
                        source_attendance.check_in,
                        source_attendance.check_out,
                        100.0,
                        AttendanceStatus::Asistio,
                        AttendanceOrigin::Propagation,
                    )
                    .await?;
                PropagationAction::Created
            }
            Some(attendance) if attendance.status != AttendanceStatus::Asistio => {
                self.attendance_repository
                    .upgrade_credit(
                        conn,
                        attendance.id,
                        source_attendance.check_in,
                        source_attendance.check_out,
                    )
                    .await?;
                PropagationAction::Upgraded
            }
            Some(_) => PropagationAction::AlreadyCredited,
        };

        if action != PropagationAction::AlreadyCredited {
            self.projection
                .project_attended(conn, student_id, target.id, now)
                .await?;
        }

        Ok(action)
    }

    /// Propagate a credited source attendance to every directly linked
    /// target. Runs inside the caller's transaction.
    pub async fn propagate(
        &self,
        conn: &mut PgConnection,
        source: &Activity,
        source_attendance: &Attendance,
        now: DateTime<Utc>,
    ) -> Result<Vec<PropagationOutcome>> {
        let targets = self
            .activity_repository
            .get_related_activities(conn, source.id)
            .await?;

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in &targets {
            let action = self
                .credit_target(conn, source_attendance, target, now)
                .await?;
            log_propagation(
                source_attendance.student_id,
                source.id,
                target.id,
                action.as_str(),
            );
            outcomes.push(PropagationOutcome {
                target_activity_id: target.id,
                target_name: target.name.clone(),
                action,
            });
        }

        Ok(outcomes)
    }

    /// Re-run propagation for an activity in bulk, optionally restricted to
    /// a set of students. With `dry_run` the summary is computed and the
    /// transaction rolled back.
    pub async fn sync_related(
        &self,
        source_activity_id: i64,
        request: SyncRelatedRequest,
    ) -> Result<SyncSummary> {
        let operation_id = generate_uuid();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let source = self
            .activity_repository
            .lock_row(&mut tx, source_activity_id)
            .await?
            .ok_or(SigeaError::ActivityNotFound {
                activity_id: source_activity_id,
            })?;

        let targets = self
            .activity_repository
            .get_related_activities(&mut tx, source.id)
            .await?;

        let student_ids = match &request.student_ids {
            Some(ids) => ids.clone(),
            None => self
                .attendance_repository
                .list_credited_by_activity(&mut tx, source.id)
                .await?
                .into_iter()
                .map(|attendance| attendance.student_id)
                .collect(),
        };

        debug!(
            operation_id = %operation_id,
            source_activity_id = source.id,
            targets = targets.len(),
            students = student_ids.len(),
            dry_run = request.dry_run,
            "Starting related-activity sync"
        );

        let mut summary = SyncSummary {
            created: 0,
            skipped: 0,
            details: Vec::new(),
        };

        for &student_id in &student_ids {
            let source_attendance = self
                .attendance_repository
                .find_by_pair(&mut tx, student_id, source.id)
                .await?;

            let credited_source = match source_attendance {
                Some(attendance) if attendance.status == AttendanceStatus::Asistio => attendance,
                _ => {
                    for target in &targets {
                        summary.skipped += 1;
                        summary.details.push(SyncDetail {
                            student_id,
                            target_activity_id: target.id,
                            action: "skipped".to_string(),
                            reason: Some("source attendance not credited".to_string()),
                        });
                    }
                    continue;
                }
            };

            for target in &targets {
                let action = if request.dry_run {
                    self.peek_target_action(&mut tx, student_id, target.id).await?
                } else {
                    self.credit_target(&mut tx, &credited_source, target, now)
                        .await?
                };

                match action {
                    PropagationAction::Created | PropagationAction::Upgraded => {
                        summary.created += 1;
                        summary.details.push(SyncDetail {
                            student_id,
                            target_activity_id: target.id,
                            action: action.as_str().to_string(),
                            reason: None,
                        });
                    }
                    PropagationAction::AlreadyCredited => {
                        summary.skipped += 1;
                        summary.details.push(SyncDetail {
                            student_id,
                            target_activity_id: target.id,
                            action: "skipped".to_string(),
                            reason: Some("already credited".to_string()),
                        });
                    }
                }
            }
        }

        if request.dry_run {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }

        info!(
            operation_id = %operation_id,
            source_activity_id = source.id,
            created = summary.created,
            skipped = summary.skipped,
            dry_run = request.dry_run,
            "Related-activity sync finished"
        );

        Ok(summary)
    }

    /// Classify what crediting would do, without mutating.
    async fn peek_target_action(
        &self,
        conn: &mut PgConnection,
        student_id: i64,
        target_activity_id: i64,
    ) -> Result<PropagationAction> {
        let existing = self
            .attendance_repository
            .find_by_pair(conn, student_id, target_activity_id)
            .await?;

        Ok(match existing {
            None => PropagationAction::Created,
            Some(attendance) if attendance.status != AttendanceStatus::Asistio => {
                PropagationAction::Upgraded
            }
            Some(_) => PropagationAction::AlreadyCredited,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaches_follows_chains() {
        let edges = [(1, 2), (2, 3), (3, 4)];
        assert!(reaches(&edges, 1, 4));
        assert!(reaches(&edges, 2, 4));
        assert!(!reaches(&edges, 4, 1));
    }

    #[test]
    fn test_reaches_handles_branches() {
        let edges = [(1, 2), (1, 3), (3, 5)];
        assert!(reaches(&edges, 1, 5));
        assert!(!reaches(&edges, 2, 5));
    }

    #[test]
    fn test_reaches_survives_existing_cycle() {
        // Traversal must terminate even when the stored edges already cycle.
        let edges = [(1, 2), (2, 3), (3, 1)];
        assert!(reaches(&edges, 1, 3));
        assert!(!reaches(&edges, 1, 9));
    }

    #[test]
    fn test_find_cycle_on_dag_is_none() {
        let edges = [(1, 2), (1, 3), (2, 4), (3, 4)];
        assert!(find_cycle(&edges).is_none());
    }

    #[test]
    fn test_find_cycle_reports_triangle() {
        let edges = [(1, 2), (2, 3), (3, 1), (5, 6)];
        let cycle = find_cycle(&edges).expect("cycle expected");
        assert!(cycle.len() >= 4);
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&1));
        assert!(cycle.contains(&2));
        assert!(cycle.contains(&3));
    }

    #[test]
    fn test_find_cycle_reports_self_loop() {
        let edges = [(1, 2), (7, 7)];
        let cycle = find_cycle(&edges).expect("cycle expected");
        assert_eq!(cycle, vec![7, 7]);
    }

    #[test]
    fn test_propagation_action_names() {
        assert_eq!(PropagationAction::Created.as_str(), "created");
        assert_eq!(PropagationAction::Upgraded.as_str(), "upgraded");
        assert_eq!(PropagationAction::AlreadyCredited.as_str(), "already_credited");
    }
}
