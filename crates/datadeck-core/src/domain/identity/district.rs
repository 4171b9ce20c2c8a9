//! District and school reference entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A school district. Immutable once created except for the `is_active`
/// flag, which soft-disables the district without cascading deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct District {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl District {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A school belonging to exactly one district
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub id: Uuid,
    pub district_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl School {
    pub fn new(district_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            district_id,
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
