//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod event;
pub mod activity;
pub mod student;
pub mod registration;
pub mod attendance;
pub mod setting;

// Re-export repositories
pub use event::EventRepository;
pub use activity::ActivityRepository;
pub use student::StudentRepository;
pub use registration::RegistrationRepository;
pub use attendance::AttendanceRepository;
pub use setting::SettingRepository;
