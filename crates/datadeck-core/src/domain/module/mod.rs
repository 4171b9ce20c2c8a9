//! Curriculum module domain
//!
//! Modules are the teaching units a session is built around. They are
//! administered out-of-band; sessions only need to pick an active one.

pub mod module;
pub mod repository;

pub use module::Module;
pub use repository::ModuleRepository;
