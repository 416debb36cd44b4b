//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod event;
pub mod activity;
pub mod student;
pub mod registration;
pub mod attendance;
pub mod setting;

// Re-export commonly used models
pub use event::{Event, CreateEventRequest, UpdateEventRequest};
pub use activity::{Activity, ActivityType, CreateActivityRequest, UpdateActivityRequest};
pub use student::{Student, CreateStudentRequest, UpdateStudentRequest};
pub use registration::{Registration, RegistrationStatus, CreateRegistrationRequest};
pub use attendance::{
    Attendance, AttendanceOrigin, AttendancePause, AttendanceState, AttendanceStatus,
    MarkPresentRequest,
};
pub use setting::{AppSetting, UpsertSettingRequest};
