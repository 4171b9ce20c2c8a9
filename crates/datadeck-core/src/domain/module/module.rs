//! Curriculum module entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A curriculum module that sessions are created against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    /// Display ordering; ties break alphabetically by name
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    pub fn new(name: impl Into<String>, description: Option<String>, sort_order: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description,
            is_active: true,
            sort_order,
            created_at: now,
            updated_at: now,
        }
    }

    /// Retire a module from the session-creation picker. Existing sessions
    /// keep their reference.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deactivate_and_reactivate() {
        let mut module = Module::new("Weather Data", None, 1);
        assert!(module.is_active);

        module.deactivate();
        assert!(!module.is_active);

        module.activate();
        assert!(module.is_active);
    }
}
