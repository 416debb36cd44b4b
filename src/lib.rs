//! SIGEA attendance accounting engine
//!
//! Event and attendance management for university complementary credits:
//! pre-registration with capacity admission and schedule-conflict detection,
//! live check-in/pause/resume/check-out with percentage scoring, credit
//! propagation across related activities, and registration/attendance
//! consistency kept in lock-step across every mutation path.

pub mod config;
pub mod services;
pub mod models;
pub mod database;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{SigeaError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
