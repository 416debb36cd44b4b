//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the SIGEA application.

use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::LoggingConfig;
use crate::utils::errors::Result;

/// Initialize logging based on configuration.
///
/// The returned guard must stay alive for the process lifetime or the file
/// writer stops flushing.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "sigea.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log attendance lifecycle actions with structured data
pub fn log_attendance_action(student_id: i64, activity_id: i64, action: &str, details: Option<&str>) {
    info!(
        student_id = student_id,
        activity_id = activity_id,
        action = action,
        details = details,
        "Attendance action performed"
    );
}

/// Log registration lifecycle actions
pub fn log_registration_action(student_id: i64, activity_id: i64, action: &str, details: Option<&str>) {
    info!(
        student_id = student_id,
        activity_id = activity_id,
        action = action,
        details = details,
        "Registration action performed"
    );
}

/// Log credit propagation across related activities
pub fn log_propagation(student_id: i64, source_activity_id: i64, target_activity_id: i64, action: &str) {
    info!(
        student_id = student_id,
        source_activity_id = source_activity_id,
        target_activity_id = target_activity_id,
        action = action,
        "Related-activity credit propagated"
    );
}

/// Log policy gate denials
pub fn log_policy_denial(operation: &str, activity_id: i64, reason: &str) {
    debug!(
        operation = operation,
        activity_id = activity_id,
        reason = reason,
        "Policy gate denied operation"
    );
}

/// Log directory API errors with context
pub fn log_directory_error(control_number: &str, error: &str) {
    error!(
        control_number = control_number,
        error = error,
        "Directory lookup failed"
    );
}

/// Log integrity audit findings
pub fn log_integrity_finding(check: &str, detail: &str) {
    error!(
        check = check,
        detail = detail,
        "Integrity audit finding"
    );
}
