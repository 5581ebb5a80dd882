//! SQLite-backed persistence for the deal event journal.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{EventRow, Repository};
