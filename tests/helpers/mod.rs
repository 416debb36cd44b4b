//! Test helpers module
//!
//! Database setup (container-backed or TEST_DATABASE_URL), a service stack
//! wired over it, and builders for seeding domain data.

pub mod database_helper;
pub mod test_data;

pub use database_helper::*;
pub use test_data::*;
