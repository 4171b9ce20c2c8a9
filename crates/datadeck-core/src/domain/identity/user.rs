//! User entity

use super::role::Role;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account: teacher, admin, staff, observer, or the account half of a
/// generated student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// One-way credential hash; never a plaintext password or PIN
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub school_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Full display name, falling back to the username
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.username.clone(),
        }
    }

    pub fn as_principal(&self) -> super::Principal {
        super::Principal::new(self.id, self.role)
    }
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub school_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
}

impl NewUser {
    /// Enforce role/association rules: teachers and observers must belong to
    /// a school and district, administrative roles must not.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::Validation("username must not be empty".into()));
        }
        if self.role.requires_school_info() {
            if self.school_id.is_none() || self.district_id.is_none() {
                return Err(Error::Validation(format!(
                    "{} accounts must have both school and district assigned",
                    self.role
                )));
            }
        } else if self.school_id.is_some() || self.district_id.is_some() {
            return Err(Error::Validation(format!(
                "{} accounts must not carry school or district associations",
                self.role
            )));
        }
        Ok(())
    }
}
