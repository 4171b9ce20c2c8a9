//! Domain layer
//!
//! Contains the core business logic and domain models.

pub mod identity;
pub mod module;
pub mod session;
pub mod student;
