//! DataDeck Core Library
//!
//! This crate provides the core functionality for DataDeck, including:
//! - Identity store (districts, schools, users, roles)
//! - Module registry (admin-curated curriculum modules)
//! - Session lifecycle (create, pause, archive, unarchive, delete)
//! - Session conflict resolution (one active session per teacher+section)
//! - Student generation (themed names, session-scoped PINs)
//! - Storage (SQLite via sqlx, versioned migrations)

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::identity::{Principal, Role};
    pub use crate::domain::session::{Session, SessionManager};
    pub use crate::domain::student::CharacterTheme;
    pub use crate::error::{Error, Result};
    pub use crate::storage::Database;
}
