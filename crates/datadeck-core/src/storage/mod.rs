//! Storage layer
//!
//! SQLite connection management and schema migrations.

pub mod database;
pub mod migrations;

pub use database::{Database, DatabaseConfig};
pub use migrations::MigrationStatus;
