//! Error handling for SIGEA
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;

/// Main error type for SIGEA operations
#[derive(Error, Debug)]
pub enum SigeaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Directory API error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Activity not found: {activity_id}")]
    ActivityNotFound { activity_id: i64 },

    #[error("Student not found: {student_id}")]
    StudentNotFound { student_id: i64 },

    #[error("No student with control number {0}")]
    UnknownControlNumber(String),

    #[error("Registration not found: {registration_id}")]
    RegistrationNotFound { registration_id: i64 },

    #[error("Attendance not found for student {student_id} in activity {activity_id}")]
    AttendanceNotFound { student_id: i64, activity_id: i64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Activity {activity_id} is full ({max_capacity} seats)")]
    CapacityFull { activity_id: i64, max_capacity: i32 },

    #[error("Student {student_id} is already registered for activity {activity_id}")]
    DuplicateRegistration { student_id: i64, activity_id: i64 },

    #[error("Schedule conflict with activity '{with_activity}': {detail}")]
    ScheduleConflict { with_activity: String, detail: String },

    #[error("Invalid related-activity link: {0}")]
    InvalidLink(LinkRejection),

    #[error("{operation} window is closed")]
    WindowClosed {
        operation: String,
        opens_at: Option<chrono::DateTime<chrono::Utc>>,
        closes_at: Option<chrono::DateTime<chrono::Utc>>,
    },

    #[error("Registration {registration_id} already has a confirmed attendance")]
    AlreadyAttended { registration_id: i64 },

    #[error("Concurrent update retries exhausted: {0}")]
    RetryExhausted(String),

    #[error("Invariant breached: {0}")]
    InvariantBreached(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Why an A -> B related-activity link was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRejection {
    #[error("an activity cannot credit itself")]
    SelfLink,

    #[error("activities belong to different events")]
    CrossEvent,

    #[error("link already exists")]
    Duplicate,

    #[error("target activity already credits other activities")]
    OutgoingExists,

    #[error("link would create a cycle")]
    WouldCycle,
}

/// Student directory API specific errors
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory request failed: {0}")]
    RequestFailed(String),

    #[error("Directory request timed out")]
    Timeout,

    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),

    #[error("Control number {0} not found in directory")]
    UnknownStudent(String),

    #[error("Directory service unavailable")]
    ServiceUnavailable,
}

/// Result type alias for SIGEA operations
pub type Result<T> = std::result::Result<T, SigeaError>;

/// Result type alias for directory operations
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Outcome class an error maps to at the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Validation,
    Conflict,
    WindowClosed,
    Transient,
    Fatal,
}

impl SigeaError {
    /// Check if the error is recoverable by retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient)
    }

    /// Map the error to its transport outcome class
    pub fn class(&self) -> ErrorClass {
        match self {
            SigeaError::EventNotFound { .. } => ErrorClass::NotFound,
            SigeaError::ActivityNotFound { .. } => ErrorClass::NotFound,
            SigeaError::StudentNotFound { .. } => ErrorClass::NotFound,
            SigeaError::UnknownControlNumber(_) => ErrorClass::NotFound,
            SigeaError::RegistrationNotFound { .. } => ErrorClass::NotFound,
            SigeaError::AttendanceNotFound { .. } => ErrorClass::NotFound,
            SigeaError::InvalidStateTransition { .. } => ErrorClass::Validation,
            SigeaError::ScheduleConflict { .. } => ErrorClass::Conflict,
            SigeaError::InvalidLink(_) => ErrorClass::Validation,
            SigeaError::InvalidInput(_) => ErrorClass::Validation,
            SigeaError::CapacityFull { .. } => ErrorClass::Conflict,
            SigeaError::DuplicateRegistration { .. } => ErrorClass::Conflict,
            SigeaError::AlreadyAttended { .. } => ErrorClass::Conflict,
            SigeaError::WindowClosed { .. } => ErrorClass::WindowClosed,
            SigeaError::RetryExhausted(_) => ErrorClass::Transient,
            SigeaError::Directory(DirectoryError::UnknownStudent(_)) => ErrorClass::NotFound,
            SigeaError::Directory(_) => ErrorClass::Transient,
            SigeaError::Http(_) => ErrorClass::Transient,
            SigeaError::ServiceUnavailable(_) => ErrorClass::Transient,
            SigeaError::Io(_) => ErrorClass::Transient,
            SigeaError::Database(_) => ErrorClass::Fatal,
            SigeaError::Migration(_) => ErrorClass::Fatal,
            SigeaError::Config(_) => ErrorClass::Fatal,
            SigeaError::Serialization(_) => ErrorClass::Fatal,
            SigeaError::UrlParse(_) => ErrorClass::Fatal,
            SigeaError::InvariantBreached(_) => ErrorClass::Fatal,
        }
    }

    /// Check whether the underlying database error is a unique-constraint
    /// violation (Postgres 23505)
    pub fn is_unique_violation(&self) -> bool {
        match self {
            SigeaError::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }

    /// Machine-readable discriminator for Conflict-class errors
    pub fn conflict_kind(&self) -> Option<&'static str> {
        match self {
            SigeaError::DuplicateRegistration { .. } => Some("duplicate"),
            SigeaError::AlreadyAttended { .. } => Some("duplicate"),
            SigeaError::CapacityFull { .. } => Some("capacity_full"),
            SigeaError::ScheduleConflict { .. } => Some("schedule_conflict"),
            _ => None,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self.class() {
            ErrorClass::Fatal => ErrorSeverity::Critical,
            ErrorClass::Transient => ErrorSeverity::Warning,
            ErrorClass::NotFound | ErrorClass::Validation => ErrorSeverity::Info,
            ErrorClass::Conflict | ErrorClass::WindowClosed => ErrorSeverity::Info,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
