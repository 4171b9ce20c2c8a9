//! Student entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generated student belonging to exactly one session
///
/// Each student is backed by a `users` row (its account half) referenced by
/// `user_id`; deleting a session removes both halves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Uuid,
    /// Denormalized owner, so roster queries skip the session join
    pub teacher_id: Uuid,
    pub character_name: String,
    pub username: String,
    /// Salted PIN hash in `salt_hex$hash_hex` form
    pub pin_hash: String,
    pub avatar_path: String,
    pub created_at: DateTime<Utc>,
}
