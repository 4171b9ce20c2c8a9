//! Generated student domain
//!
//! Students are dependent records: they exist only inside a session, carry a
//! themed character name instead of a real identity, and log in with the
//! session code plus a 4-digit PIN.

pub mod generator;
pub mod pin;
pub mod repository;
pub mod student;
pub mod themes;

pub use generator::{GeneratedStudent, StudentGenerator};
pub use repository::StudentRepository;
pub use student::Student;
pub use themes::CharacterTheme;
