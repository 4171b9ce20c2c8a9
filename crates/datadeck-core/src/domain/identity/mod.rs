//! Identity domain module
//!
//! Districts, schools, users, and roles. Sessions and students reference
//! these entities by foreign key; credential verification itself lives with
//! the out-of-process authentication layer.

pub mod district;
pub mod repository;
pub mod role;
pub mod user;

pub use district::{District, School};
pub use repository::IdentityRepository;
pub use role::{Principal, Role};
pub use user::{NewUser, User};
