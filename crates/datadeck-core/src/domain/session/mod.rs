//! Classroom session domain
//!
//! Lifecycle, the one-active-session-per-(teacher, section) invariant,
//! conflict resolution, and session-scoped student rosters.

pub mod manager;
pub mod repository;
pub mod session;

pub use manager::{CreatedSession, NewSession, SessionManager};
pub use repository::{SessionRepository, SessionStatusFilter};
pub use session::Session;
