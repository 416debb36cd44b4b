//! Services module
//!
//! Business logic over the repositories. Transactions are owned here;
//! repositories execute single statements on the connection they are given.

pub mod activity;
pub mod attendance;
pub mod conflict;
pub mod credit;
pub mod directory;
pub mod integrity;
pub mod policy;
pub mod projection;
pub mod registration;
pub mod related;
pub mod scoring;

// Re-export commonly used services and their outcome types
pub use activity::ActivityService;
pub use attendance::{AttendanceService, CheckInOutcome, CheckOutOutcome, MarkOutcome};
pub use conflict::ConflictService;
pub use credit::{CreditService, CreditStatus};
pub use directory::{DirectoryService, DirectoryStudent};
pub use integrity::{IntegrityReport, IntegrityService, Violation};
pub use policy::{GateDecision, PolicyGate, PolicyNumbers};
pub use projection::ProjectionService;
pub use registration::{
    BulkCreateOutcome, BulkSkip, ConfirmOutcome, RegisterOutcome, RegistrationService,
};
pub use related::{
    PropagationAction, PropagationOutcome, RelatedActivityService, SyncRelatedRequest, SyncSummary,
};
pub use scoring::{compute_score, PauseSpan, Score, ScoreInput};

use crate::config::settings::Settings;
use crate::database::connection::DatabasePool;
use crate::database::DatabaseService;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub database: DatabaseService,
    pub catalog: ActivityService,
    pub registrations: RegistrationService,
    pub attendances: AttendanceService,
    pub related: RelatedActivityService,
    pub credits: CreditService,
    pub integrity: IntegrityService,
    pub policy: PolicyGate,
    pub directory: DirectoryService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services wired together
    pub fn new(pool: DatabasePool, settings: Settings) -> Result<Self> {
        let database = DatabaseService::new(pool.clone());

        let projection = ProjectionService::new(database.registrations.clone());
        let conflicts = ConflictService::new(database.registrations.clone(), &settings)?;
        let policy = PolicyGate::new(database.settings.clone(), settings.clone());
        let directory = DirectoryService::new(settings.clone())?;

        let related = RelatedActivityService::new(
            database.activities.clone(),
            database.attendances.clone(),
            projection.clone(),
            pool.clone(),
        );
        let attendances = AttendanceService::new(
            database.attendances.clone(),
            database.activities.clone(),
            database.students.clone(),
            related.clone(),
            projection.clone(),
            policy.clone(),
            pool.clone(),
        );
        let registrations = RegistrationService::new(
            database.registrations.clone(),
            database.activities.clone(),
            database.students.clone(),
            database.attendances.clone(),
            conflicts,
            projection,
            policy.clone(),
            directory.clone(),
            pool.clone(),
            settings.clone(),
        );
        let credits = CreditService::new(
            database.events.clone(),
            database.students.clone(),
            database.attendances.clone(),
            settings.clone(),
        );
        let catalog = ActivityService::new(
            database.events.clone(),
            database.activities.clone(),
            database.students.clone(),
            pool,
            &settings,
        )?;
        let integrity = IntegrityService::new(database.clone());

        Ok(Self {
            database,
            catalog,
            registrations,
            attendances,
            related,
            credits,
            integrity,
            policy,
            directory,
        })
    }
}
