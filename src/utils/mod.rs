//! Utility modules
//!
//! This module contains common utilities used throughout the application,
//! including error handling, logging setup, time arithmetic, and helper
//! functions.

pub mod errors;
pub mod helpers;
pub mod logging;
pub mod time;

pub use errors::{Result, SigeaError};
