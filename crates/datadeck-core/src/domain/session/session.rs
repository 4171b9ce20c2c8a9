//! Session entity and lifecycle transitions

use crate::domain::student::CharacterTheme;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A classroom session
///
/// A teacher holds at most one non-archived session per section. Pause and
/// archive are independent axes: pausing blocks student logins while the
/// session stays current, archiving retires the session and frees the
/// (teacher, section) slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    /// Name as it was before archiving, kept so unarchive can restore it
    pub original_name: Option<String>,
    /// Short join code students use to log in, unique across all sessions
    pub session_code: String,
    /// Class period, 1-based
    pub section: i64,
    pub module_id: Uuid,
    pub character_theme: CharacterTheme,
    pub is_paused: bool,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new active session
    pub fn new(
        name: impl Into<String>,
        session_code: impl Into<String>,
        section: i64,
        module_id: Uuid,
        character_theme: CharacterTheme,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            original_name: None,
            session_code: session_code.into(),
            section,
            module_id,
            character_theme,
            is_paused: false,
            is_archived: false,
            archived_at: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this session holds its (teacher, section) slot
    pub fn is_active(&self) -> bool {
        !self.is_archived
    }

    /// Pause student logins. No-op if already paused.
    pub fn pause(&mut self) {
        if !self.is_paused {
            self.is_paused = true;
            self.updated_at = Utc::now();
        }
    }

    /// Resume student logins. No-op if not paused.
    pub fn unpause(&mut self) {
        if self.is_paused {
            self.is_paused = false;
            self.updated_at = Utc::now();
        }
    }

    /// Archive the session, stamping the name with the archive date so the
    /// retired session stays recognizable in listings. No-op if already
    /// archived. The pause flag is left untouched.
    pub fn archive(&mut self) {
        if self.is_archived {
            return;
        }
        let now = Utc::now();
        self.original_name = Some(self.name.clone());
        self.name = format!("{} [Archived {}]", self.name, now.format("%Y-%m-%d"));
        self.is_archived = true;
        self.archived_at = Some(now);
        self.updated_at = now;
    }

    /// Restore an archived session, recovering the pre-archive name. No-op
    /// if not archived. The caller is responsible for checking that the
    /// (teacher, section) slot is free first.
    pub fn unarchive(&mut self) {
        if !self.is_archived {
            return;
        }
        if let Some(original) = self.original_name.take() {
            self.name = original;
        }
        self.is_archived = false;
        self.archived_at = None;
        self.updated_at = Utc::now();
    }
}
