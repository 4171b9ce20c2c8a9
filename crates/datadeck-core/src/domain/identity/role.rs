//! User roles and the acting principal

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Closed set of user roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    Teacher,
    Observer,
    Student,
}

impl Role {
    /// Create from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "staff" => Some(Self::Staff),
            "teacher" => Some(Self::Teacher),
            "observer" => Some(Self::Observer),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Teacher => "teacher",
            Self::Observer => "observer",
            Self::Student => "student",
        }
    }

    /// Whether this role must carry school and district associations
    pub fn requires_school_info(&self) -> bool {
        matches!(self, Self::Teacher | Self::Observer)
    }

    /// Whether this role can override ownership checks on any session
    pub fn has_admin_override(&self) -> bool {
        matches!(self, Self::Admin | Self::Staff)
    }

    /// Whether this role may create sessions
    pub fn can_create_sessions(&self) -> bool {
        matches!(self, Self::Teacher | Self::Admin | Self::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authenticated actor behind a mutating call
///
/// Supplied by the authentication layer; this core only uses it for
/// ownership and role checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether this principal may mutate a session owned by `owner_id`
    pub fn owns_or_overrides(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.role.has_admin_override()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("teacher"), Some(Role::Teacher));
        assert_eq!(Role::from_str("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_str("Observer"), Some(Role::Observer));
        assert_eq!(Role::from_str("principal"), None);
    }

    #[test]
    fn test_role_school_info_requirements() {
        assert!(Role::Teacher.requires_school_info());
        assert!(Role::Observer.requires_school_info());
        assert!(!Role::Admin.requires_school_info());
        assert!(!Role::Staff.requires_school_info());
        assert!(!Role::Student.requires_school_info());
    }

    #[test]
    fn test_principal_override() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(Principal::new(owner, Role::Teacher).owns_or_overrides(owner));
        assert!(!Principal::new(other, Role::Teacher).owns_or_overrides(owner));
        assert!(Principal::new(other, Role::Admin).owns_or_overrides(owner));
        assert!(Principal::new(other, Role::Staff).owns_or_overrides(owner));
        assert!(!Principal::new(other, Role::Observer).owns_or_overrides(owner));
    }
}
